//! Rules and schedules.
//!
//! A [`Schedule`] is an ordered list of [`Rule`]s followed by a default
//! [`Value`]. Rules come from configuration as [`RuleDef`] entries and are
//! checked and compiled once by [`build_schedule`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::expr::{CompiledExpr, Environment};
use crate::time::LocalTime;
use crate::value::Value;
use crate::window::TimeWindow;

/// One entry of a rule list.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// A static value, optionally limited to a time window.
    Value {
        value: Value,
        window: Option<TimeWindow>,
    },
    /// An expression yielding a directive or a value.
    Control { expr: CompiledExpr },
    /// A nested list, optionally limited to a time window.
    Group {
        rules: Vec<Rule>,
        window: Option<TimeWindow>,
    },
}

impl Rule {
    fn visit<'a>(&'a self, visit: &mut impl FnMut(&'a Rule)) {
        visit(self);
        if let Self::Group { rules, .. } = self {
            for rule in rules {
                rule.visit(visit);
            }
        }
    }

    fn window(&self) -> Option<&TimeWindow> {
        match self {
            Self::Value { window, .. } | Self::Group { window, .. } => window.as_ref(),
            Self::Control { .. } => None,
        }
    }
}

/// Ordered rules plus the value used when none of them match.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    rules: Vec<Rule>,
    default: Value,
}

impl Schedule {
    #[must_use]
    pub fn new(rules: Vec<Rule>, default: Value) -> Self {
        Self { rules, default }
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn default_value(&self) -> Value {
        self.default
    }

    /// Every control rule expression, in list order, including nested ones.
    #[must_use]
    pub fn expressions(&self) -> Vec<&CompiledExpr> {
        let mut found = Vec::new();
        for rule in &self.rules {
            rule.visit(&mut |rule| {
                if let Rule::Control { expr } = rule {
                    found.push(expr);
                }
            });
        }
        found
    }

    /// The earliest instant after `now` at which any window of the schedule
    /// opens or closes.
    #[must_use]
    pub fn next_boundary(&self, now: &LocalTime) -> Option<LocalTime> {
        let mut next: Option<LocalTime> = None;
        for rule in &self.rules {
            rule.visit(&mut |rule| {
                if let Some(boundary) = rule.window().and_then(|w| w.next_boundary(now))
                    && next.is_none_or(|current| boundary < current)
                {
                    next = Some(boundary);
                }
            });
        }
        next
    }
}

/// Position of a rule inside a schedule, as indices into nested lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RulePath(Vec<usize>);

impl RulePath {
    #[must_use]
    pub fn root(index: usize) -> Self {
        Self(vec![index])
    }

    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for RulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("schedule")?;
        for (depth, index) in self.0.iter().enumerate() {
            if depth == 0 {
                write!(f, "[{index}]")?;
            } else {
                write!(f, ".rules[{index}]")?;
            }
        }
        Ok(())
    }
}

/// A value as written in configuration: a number, `[min, max]` or `"off"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueDef {
    Temperature(f64),
    Range([f64; 2]),
    Keyword(String),
}

impl ValueDef {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for non-finite numbers,
    /// inverted ranges and unknown keywords.
    pub fn build(&self) -> Result<Value, ConfigError> {
        match self {
            Self::Temperature(value) => Value::temperature(*value),
            Self::Range([min, max]) => Value::range(*min, *max),
            Self::Keyword(word) if word.eq_ignore_ascii_case("off") => Ok(Value::off()),
            Self::Keyword(_) => Err(ConfigError::InvalidValue {
                reason: "the only keyword value is \"off\"",
            }),
        }
    }
}

/// A rule entry as written in configuration.
///
/// Exactly one of `v`, `x` and `rules` must be set. `start`, `end` and
/// `weekdays` are accepted on `v` and `rules` entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<ValueDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<RuleDef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekdays: Option<String>,
}

impl RuleDef {
    fn has_window(&self) -> bool {
        self.start.is_some() || self.end.is_some() || self.weekdays.is_some()
    }

    fn window(&self) -> Result<Option<TimeWindow>, ConfigError> {
        if !self.has_window() {
            return Ok(None);
        }
        TimeWindow::parse(
            self.start.as_deref(),
            self.end.as_deref(),
            self.weekdays.as_deref(),
        )
        .map(Some)
    }

    /// Check and compile this entry, located at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first problem found.
    pub fn build(&self, path: &RulePath, env: &Environment) -> Result<Rule, ConfigError> {
        match (&self.v, &self.x, &self.rules) {
            (Some(value), None, None) => Ok(Rule::Value {
                value: value.build()?,
                window: self.window()?,
            }),
            (None, Some(source), None) => {
                if self.has_window() {
                    return Err(ConfigError::WindowOnControlRule {
                        path: path.to_string(),
                    });
                }
                Ok(Rule::Control {
                    expr: env.compile(source)?,
                })
            }
            (None, None, Some(rules)) => {
                if rules.is_empty() {
                    return Err(ConfigError::EmptyGroup {
                        path: path.to_string(),
                    });
                }
                let rules = rules
                    .iter()
                    .enumerate()
                    .map(|(index, rule)| rule.build(&path.child(index), env))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Rule::Group {
                    rules,
                    window: self.window()?,
                })
            }
            _ => Err(ConfigError::AmbiguousRule {
                path: path.to_string(),
            }),
        }
    }
}

/// Compile a top-level rule list whose last entry is the bare default.
///
/// # Errors
///
/// Returns [`ConfigError::MissingDefault`] when the list is empty or does
/// not end with a bare `v` entry, or the first error of any other entry.
pub fn build_schedule(defs: &[RuleDef], env: &Environment) -> Result<Schedule, ConfigError> {
    let Some((last, rules)) = defs.split_last() else {
        return Err(ConfigError::MissingDefault);
    };
    let default = match last {
        RuleDef {
            v: Some(value),
            x: None,
            rules: None,
            ..
        } if !last.has_window() => value.build()?,
        _ => return Err(ConfigError::MissingDefault),
    };

    let rules = rules
        .iter()
        .enumerate()
        .map(|(index, rule)| rule.build(&RulePath::root(index), env))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Schedule::new(rules, default))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        schedule: Vec<RuleDef>,
    }

    fn defs(toml_source: &str) -> Vec<RuleDef> {
        toml::from_str::<Wrapper>(toml_source).unwrap().schedule
    }

    fn build(toml_source: &str) -> Result<Schedule, ConfigError> {
        build_schedule(&defs(toml_source), &Environment::default())
    }

    #[test]
    fn should_deserialize_all_value_shapes() {
        let defs = defs(
            r#"
            schedule = [
                { v = 68 },
                { v = 67.5 },
                { v = [65, 70] },
                { v = "off" },
            ]
            "#,
        );
        assert_eq!(defs[0].v, Some(ValueDef::Temperature(68.0)));
        assert_eq!(defs[1].v, Some(ValueDef::Temperature(67.5)));
        assert_eq!(defs[2].v, Some(ValueDef::Range([65.0, 70.0])));
        assert_eq!(defs[3].v, Some(ValueDef::Keyword("off".to_string())));
    }

    #[test]
    fn should_build_nested_schedule() {
        let schedule = build(
            r#"
            [[schedule]]
            x = "Next()"

            [[schedule]]
            weekdays = "1-5"
            rules = [
                { v = [65, 70], start = "07:00", end = "22:00" },
                { x = "Break()" },
            ]

            [[schedule]]
            v = [62, 80]
            "#,
        )
        .unwrap();

        assert_eq!(schedule.rules().len(), 2);
        assert_eq!(schedule.default_value(), Value::range(62.0, 80.0).unwrap());
        assert_eq!(schedule.expressions().len(), 2);
        let Rule::Group { rules, window } = &schedule.rules()[1] else {
            panic!("expected a group");
        };
        assert_eq!(rules.len(), 2);
        assert_eq!(window.unwrap().weekdays().to_string(), "1,2,3,4,5");
    }

    #[test]
    fn should_require_trailing_default() {
        assert!(matches!(build("schedule = []"), Err(ConfigError::MissingDefault)));
        assert!(matches!(
            build(r#"schedule = [{ x = "Next()" }]"#),
            Err(ConfigError::MissingDefault)
        ));
        assert!(matches!(
            build(r#"schedule = [{ v = 60, start = "07:00" }]"#),
            Err(ConfigError::MissingDefault)
        ));
    }

    #[test]
    fn should_reject_entry_with_two_kinds() {
        let err = build(r#"schedule = [{ v = 60 }, { v = 60, x = "Next()" }, { v = 60 }]"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousRule { path } if path == "schedule[1]"));
    }

    #[test]
    fn should_reject_entry_with_no_kind() {
        let err = build(r#"schedule = [{ start = "07:00" }, { v = 60 }]"#).unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousRule { .. }));
    }

    #[test]
    fn should_reject_window_on_control_rule() {
        let err = build(
            r#"schedule = [{ rules = [{ v = 1 }, { x = "Next()", start = "07:00" }] }, { v = 60 }]"#,
        )
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::WindowOnControlRule { path } if path == "schedule[0].rules[1]")
        );
    }

    #[test]
    fn should_reject_empty_group() {
        let err = build(r"schedule = [{ rules = [] }, { v = 60 }]").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyGroup { .. }));
    }

    #[test]
    fn should_reject_unknown_keyword_value() {
        let err = build(r#"schedule = [{ v = "warm" }]"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn should_reject_inverted_range() {
        let err = build(r"schedule = [{ v = [70, 65] }]").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn should_reject_malformed_time() {
        let err = build(r#"schedule = [{ v = 1, start = "7am" }, { v = 60 }]"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTime { .. }));
    }

    #[test]
    fn should_propagate_expression_errors() {
        let err = build(r#"schedule = [{ x = "Next(" }, { v = 60 }]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { .. }));
    }

    #[test]
    fn should_find_earliest_boundary_across_nested_windows() {
        let schedule = build(
            r#"
            schedule = [
                { v = 70, start = "07:00", end = "22:00" },
                { rules = [{ v = 60, start = "12:30", end = "13:00" }] },
                { v = 62 },
            ]
            "#,
        )
        .unwrap();
        let now = NaiveDate::from_ymd_opt(2026, 1, 5)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(
            schedule.next_boundary(&now),
            Some(now.date().and_hms_opt(12, 30, 0).unwrap())
        );
    }

    #[test]
    fn should_have_no_boundary_without_windows() {
        let schedule = build(r#"schedule = [{ x = "Next()" }, { v = 62 }]"#).unwrap();
        let now = NaiveDate::from_ymd_opt(2026, 1, 5)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(schedule.next_boundary(&now), None);
    }

    #[test]
    fn should_display_rule_path() {
        assert_eq!(RulePath::root(2).child(0).child(3).to_string(), "schedule[2].rules[0].rules[3]");
    }
}
