//! Ordered fallback chains
//!
//! Every heuristic in the converter has the same shape: try a list of
//! extractors in a fixed order and keep the first that produces something
//! acceptable. A [`Chain`] makes that list a value, so the order can be
//! inspected, tested and reported step by step.

use regex::{Regex, RegexBuilder};

use super::logger::{AnalysisEvent, AnalysisLogger};

/// A recognised, non-exceptional failure of one heuristic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseMiss {
    #[error("pattern did not match")]
    NoMatch,

    #[error("no matching closing brace after offset {0}")]
    Unbalanced(usize),

    #[error("candidate rejected: {0}")]
    Rejected(String),

    #[error("all {0} steps missed")]
    Exhausted(usize),
}

pub type Attempt<T> = Result<T, ParseMiss>;

/// Short human-readable form of an extracted value for event reporting.
pub trait Summarize {
    fn summarize(&self) -> String;
}

impl Summarize for String {
    fn summarize(&self) -> String {
        self.chars().take(120).collect()
    }
}

type StepFn<'a, T> = Box<dyn Fn(&str) -> Attempt<T> + Send + Sync + 'a>;

/// An ordered list of labelled extractors for one field.
pub struct Chain<'a, T> {
    field: &'static str,
    steps: Vec<(&'static str, StepFn<'a, T>)>,
}

impl<'a, T: Summarize> Chain<'a, T> {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            steps: Vec::new(),
        }
    }

    /// Append a step; steps run in insertion order.
    pub fn step<F>(mut self, label: &'static str, extractor: F) -> Self
    where
        F: Fn(&str) -> Attempt<T> + Send + Sync + 'a,
    {
        self.steps.push((label, Box::new(extractor)));
        self
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.steps.iter().map(|(label, _)| *label).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run the steps in order and return the first success.
    pub fn resolve(&self, input: &str, logger: &dyn AnalysisLogger) -> Attempt<T> {
        for (label, extractor) in &self.steps {
            match extractor(input) {
                Ok(value) => {
                    logger.record(AnalysisEvent::StepMatched {
                        field: self.field,
                        step: *label,
                        value: value.summarize(),
                    });
                    return Ok(value);
                }
                Err(miss) => logger.record(AnalysisEvent::StepMissed {
                    field: self.field,
                    step: *label,
                    reason: miss.to_string(),
                }),
            }
        }
        Err(ParseMiss::Exhausted(self.steps.len()))
    }

    /// Like [`Chain::resolve`], but substitute `default` (and report it) on a miss.
    pub fn resolve_or(&self, input: &str, logger: &dyn AnalysisLogger, default: T) -> T {
        self.resolve(input, logger).unwrap_or_else(|_| {
            logger.record(AnalysisEvent::DefaultApplied {
                field: self.field,
                value: default.summarize(),
            });
            default
        })
    }
}

impl<'a> Chain<'a, String> {
    /// Build a chain where each step captures from one regex and the capture
    /// must pass `accept`. Only the first match of each regex is considered.
    pub fn from_regexes<I>(field: &'static str, patterns: I, accept: fn(&str) -> bool) -> Self
    where
        I: IntoIterator<Item = (&'static str, &'a Regex)>,
    {
        patterns
            .into_iter()
            .fold(Chain::new(field), |chain, (label, re)| {
                chain.step(label, move |text| {
                    let value = capture(re, text)?;
                    if accept(&value) {
                        Ok(value)
                    } else {
                        Err(ParseMiss::Rejected(value))
                    }
                })
            })
    }
}

/// First match of `re`: capture group 1 when the pattern has one, otherwise
/// the whole match.
pub fn capture(re: &Regex, text: &str) -> Attempt<String> {
    let caps = re.captures(text).ok_or(ParseMiss::NoMatch)?;
    caps.get(1)
        .or_else(|| caps.get(0))
        .map(|m| m.as_str().to_string())
        .ok_or(ParseMiss::NoMatch)
}

/// Accept any capture.
pub fn any(_: &str) -> bool {
    true
}

/// Compile a constant pattern whose bounded repeats outgrow the default
/// compiled-size limit.
pub fn large_regex(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .size_limit(64 * (1 << 20))
        .build()
        .expect("static pattern")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::logger::RecordingAnalysisLogger;

    #[test]
    fn test_chain_runs_in_order_and_stops_at_first_success() {
        let logger = RecordingAnalysisLogger::new();
        let chain = Chain::new("greeting")
            .step("never", |_| Err(ParseMiss::NoMatch))
            .step("hello", |_| Ok("hello".to_string()))
            .step("unreached", |_| Ok("unreached".to_string()));

        assert_eq!(chain.labels(), vec!["never", "hello", "unreached"]);
        assert_eq!(chain.resolve("", &logger), Ok("hello".to_string()));
        assert_eq!(logger.matched_step("greeting"), Some("hello"));
        assert_eq!(logger.events().len(), 2);
    }

    #[test]
    fn test_chain_exhaustion_and_default() {
        let logger = RecordingAnalysisLogger::new();
        let chain: Chain<'_, String> =
            Chain::new("lang").step("never", |_| Err(ParseMiss::NoMatch));

        assert_eq!(chain.resolve("", &logger), Err(ParseMiss::Exhausted(1)));
        assert_eq!(chain.resolve_or("", &logger, "en".to_string()), "en");
        assert!(logger.defaulted("lang"));
    }

    #[test]
    fn test_regex_chain_acceptance() {
        let short = Regex::new(r#"name:"([^"]+)""#).unwrap();
        let long = Regex::new(r#"title:"([^"]+)""#).unwrap();
        let logger = RecordingAnalysisLogger::new();
        let chain = Chain::from_regexes("name", [("name", &short), ("title", &long)], |v| {
            v.len() > 2
        });

        let found = chain.resolve(r#"{name:"ab", title:"Long Title"}"#, &logger);
        assert_eq!(found, Ok("Long Title".to_string()));
        assert!(logger.events().iter().any(|e| matches!(
            e,
            AnalysisEvent::StepMissed { step: "name", reason, .. } if reason.contains("ab")
        )));
    }

    #[test]
    fn test_capture_without_group_uses_whole_match() {
        let re = Regex::new(r"https?://[^'\x22]+").unwrap();
        assert_eq!(
            capture(&re, "x = 'https://a.example/p'"),
            Ok("https://a.example/p".to_string())
        );
        assert_eq!(capture(&re, "nothing"), Err(ParseMiss::NoMatch));
    }
}
