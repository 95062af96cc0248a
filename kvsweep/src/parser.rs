//! Parser for the benchmark's `<Label>: <number>` summary lines
//!
//! A label is split into lowercase alphanumeric tokens. It names a measurement
//! only when exactly one stage token (`load`, `run`) and exactly one metric
//! token (`runtime`, `operations`, `throughput`, or anything ending in `rss`)
//! are present. Everything else the tool prints is skipped, so extra output
//! never breaks a sweep, but a recognised label with a bad number does.

use tracing::{debug, trace};

use crate::error::ProcessError;
use crate::record::{MeasurementRecord, MetricKind, Stage};

const SEPARATOR: &str = ": ";

/// One recognised summary line
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub stage: Stage,
    pub metric: MetricKind,
    pub value: f64,
}

/// Why a line was not treated as a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skipped {
    NoSeparator,
    NoStage,
    AmbiguousStage,
    NoMetric,
    AmbiguousMetric,
}

/// Classification of a single output line
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Measurement(Measurement),
    Skipped(Skipped),
}

fn label_tokens(label: &str) -> impl Iterator<Item = String> + '_ {
    label
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}

fn stage_tag(token: &str) -> Option<Stage> {
    match token {
        "load" => Some(Stage::Load),
        "run" => Some(Stage::Run),
        _ => None,
    }
}

fn metric_tag(token: &str) -> Option<MetricKind> {
    match token {
        MetricKind::RUNTIME => Some(MetricKind::Runtime),
        MetricKind::OPERATIONS => Some(MetricKind::Operations),
        MetricKind::THROUGHPUT => Some(MetricKind::Throughput),
        t if t.ends_with("rss") => Some(MetricKind::ResidentMemory(t.to_string())),
        _ => None,
    }
}

/// Classify one line of benchmark output
pub fn parse_line(line: &str) -> Result<ParsedLine, ProcessError> {
    let Some((label, raw_value)) = line.trim().split_once(SEPARATOR) else {
        return Ok(ParsedLine::Skipped(Skipped::NoSeparator));
    };

    let mut stages = Vec::new();
    let mut metrics = Vec::new();
    for token in label_tokens(label) {
        if let Some(stage) = stage_tag(&token) {
            stages.push(stage);
        } else if let Some(metric) = metric_tag(&token) {
            metrics.push(metric);
        }
    }

    let stage = match stages.as_slice() {
        [] => return Ok(ParsedLine::Skipped(Skipped::NoStage)),
        [stage] => *stage,
        _ => return Ok(ParsedLine::Skipped(Skipped::AmbiguousStage)),
    };
    let metric = match metrics.len() {
        0 => return Ok(ParsedLine::Skipped(Skipped::NoMetric)),
        1 => metrics.remove(0),
        _ => return Ok(ParsedLine::Skipped(Skipped::AmbiguousMetric)),
    };

    let value: f64 = raw_value
        .trim()
        .parse()
        .map_err(|e: std::num::ParseFloatError| ProcessError::Unparsable {
            line: line.to_string(),
            reason: e.to_string(),
        })?;
    if !value.is_finite() {
        return Err(ProcessError::Unparsable {
            line: line.to_string(),
            reason: "value is not finite".to_string(),
        });
    }

    Ok(ParsedLine::Measurement(Measurement {
        stage,
        metric,
        value,
    }))
}

/// Parse the complete standard output of one trial
pub fn parse_output(stdout: &str) -> Result<MeasurementRecord, ProcessError> {
    let mut record = MeasurementRecord::with_placeholders();

    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        match parse_line(line)? {
            ParsedLine::Measurement(m) => {
                trace!(stage = %m.stage, metric = m.metric.name(), value = m.value, "measurement");
                record.set(m.stage, &m.metric, m.value);
            }
            ParsedLine::Skipped(reason) => {
                debug!(?reason, line, "skipping benchmark output line");
            }
        }
    }

    Ok(record)
}
