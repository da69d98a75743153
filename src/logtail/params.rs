//! Request and tailer parameters, plus the record filter they describe.

use super::record::{Level, LogRecord};

/// Parameters of a debug-log request, as received from the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugLogParams {
    /// Stop after this many lines (`0` = unlimited).
    pub max_lines: u64,
    /// Minimum level to send.
    pub filter_level: Level,
    /// Send the backlog only, then finish.
    pub no_tail: bool,
    /// Number of stored lines to replay first (`0` = all).
    pub backlog: usize,
    pub include_entity: Vec<String>,
    pub exclude_entity: Vec<String>,
    pub include_module: Vec<String>,
    pub exclude_module: Vec<String>,
    /// Replay every stored line regardless of `backlog`.
    pub from_the_start: bool,
}

impl DebugLogParams {
    /// Converts the request into tailer parameters.
    pub fn tailer_params(&self) -> LogTailerParams {
        LogTailerParams {
            min_level: self.filter_level,
            no_tail: self.no_tail,
            initial_lines: if self.from_the_start { 0 } else { self.backlog },
            include_entity: self.include_entity.clone(),
            exclude_entity: self.exclude_entity.clone(),
            include_module: self.include_module.clone(),
            exclude_module: self.exclude_module.clone(),
        }
    }
}

/// Parameters understood by a [`LogTailerSource`](super::LogTailerSource).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogTailerParams {
    pub min_level: Level,
    pub no_tail: bool,
    /// Replay only the last N matching stored records (`0` = all of them).
    pub initial_lines: usize,
    /// Entity patterns; `*` matches any run of characters.
    pub include_entity: Vec<String>,
    pub exclude_entity: Vec<String>,
    /// Module names; a name also matches its dotted children.
    pub include_module: Vec<String>,
    pub exclude_module: Vec<String>,
}

impl LogTailerParams {
    /// Returns `true` if `r` passes every filter.
    pub fn matches(&self, r: &LogRecord) -> bool {
        r.level >= self.min_level
            && included(&self.include_entity, |p| entity_matches(p, &r.entity))
            && !self.exclude_entity.iter().any(|p| entity_matches(p, &r.entity))
            && included(&self.include_module, |p| module_matches(p, &r.module))
            && !self.exclude_module.iter().any(|p| module_matches(p, &r.module))
    }
}

fn included(patterns: &[String], f: impl Fn(&str) -> bool) -> bool {
    patterns.is_empty() || patterns.iter().any(|p| f(p))
}

/// Glob match where `*` is the only metacharacter.
pub(crate) fn entity_matches(pattern: &str, entity: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = entity.strip_prefix(first) else {
        return false;
    };
    let mut pieces: Vec<&str> = parts.collect();
    let Some(last) = pieces.pop() else {
        // no `*` at all
        return rest.is_empty();
    };
    for piece in pieces {
        match rest.find(piece) {
            Some(at) => rest = &rest[at + piece.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

pub(crate) fn module_matches(pattern: &str, module: &str) -> bool {
    match module.strip_prefix(pattern) {
        Some("") => true,
        Some(tail) => tail.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_the_start_overrides_backlog() {
        let req = DebugLogParams {
            backlog: 10,
            from_the_start: true,
            filter_level: Level::Info,
            include_module: vec!["juju.worker".into()],
            ..Default::default()
        };
        let p = req.tailer_params();
        assert_eq!(p.initial_lines, 0);
        assert_eq!(p.min_level, Level::Info);
        assert_eq!(p.include_module, vec!["juju.worker".to_string()]);

        let req = DebugLogParams {
            backlog: 10,
            ..Default::default()
        };
        assert_eq!(req.tailer_params().initial_lines, 10);
    }

    #[test]
    fn entity_globs() {
        assert!(entity_matches("machine-0", "machine-0"));
        assert!(!entity_matches("machine-0", "machine-01"));
        assert!(entity_matches("unit-*", "unit-mysql-0"));
        assert!(entity_matches("*-0", "unit-mysql-0"));
        assert!(entity_matches("unit-*-0", "unit-mysql-0"));
        assert!(!entity_matches("unit-*-1", "unit-mysql-0"));
        assert!(entity_matches("*", "anything"));
        assert!(!entity_matches("unit-*-*-0", "unit-0"));
    }

    #[test]
    fn modules_match_dotted_children() {
        assert!(module_matches("juju.worker", "juju.worker"));
        assert!(module_matches("juju.worker", "juju.worker.uniter"));
        assert!(!module_matches("juju.worker", "juju.workers"));
        assert!(!module_matches("juju.worker", "juju"));
    }

    #[test]
    fn record_filtering() {
        let p = LogTailerParams {
            min_level: Level::Info,
            include_entity: vec!["unit-*".into()],
            exclude_module: vec!["juju.noisy".into()],
            ..Default::default()
        };
        let ok = LogRecord::new("unit-a-0", Level::Info, "juju.quiet", "x");
        assert!(p.matches(&ok));
        assert!(!p.matches(&LogRecord::new("unit-a-0", Level::Debug, "juju.quiet", "x")));
        assert!(!p.matches(&LogRecord::new("machine-0", Level::Info, "juju.quiet", "x")));
        assert!(!p.matches(&LogRecord::new("unit-a-0", Level::Info, "juju.noisy.sub", "x")));
    }
}
