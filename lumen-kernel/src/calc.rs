//! Debounced calculator.
//!
//! Keystrokes never evaluate directly; they mark the expression dirty and
//! arm a deadline. One evaluation runs per quiet period, always with the
//! latest expression, so a burst of typing costs a single process spawn.

use std::time::{Duration, Instant};

use crate::exec;

/// Debounce state plus the rolling result history for a calculator session.
pub struct Calculator {
    delay: Duration,
    dirty: bool,
    deadline: Option<Instant>,
    pending: String,

    /// Result line for the expression currently in the input, if any.
    current: Option<String>,
    /// Previous result lines, newest first.
    history: Vec<String>,
    history_limit: usize,
    /// Label prepended to the current result line. History lines stay
    /// bare so they read as past expressions.
    display_prefix: Option<String>,
}

impl Calculator {
    pub fn new(delay: Duration, history_limit: usize, display_prefix: Option<String>) -> Self {
        Self {
            delay,
            dirty: false,
            deadline: None,
            pending: String::new(),
            current: None,
            history: Vec::new(),
            history_limit,
            display_prefix,
        }
    }

    /// Record an input change and (re)arm the evaluation deadline.
    pub fn mark_dirty(&mut self, expr: &str, now: Instant) {
        self.pending = expr.to_string();
        self.dirty = true;
        self.deadline = Some(now + self.delay);
    }

    /// The instant the pending evaluation becomes due, for the dispatch
    /// loop's timeout computation.
    pub fn deadline(&self) -> Option<Instant> {
        if self.dirty {
            self.deadline
        } else {
            None
        }
    }

    /// Evaluate the pending expression if its quiet period has elapsed.
    /// Returns whether an evaluation ran.
    pub fn update_if_ready(
        &mut self,
        now: Instant,
        eval: impl FnOnce(&str) -> Option<String>,
    ) -> bool {
        if !self.dirty {
            return false;
        }
        match self.deadline {
            Some(deadline) if now >= deadline => self.run_eval(eval),
            _ => false,
        }
    }

    /// Evaluate immediately, ignoring the deadline. Used on explicit
    /// submission so the shown result always matches the submitted input.
    pub fn force_update(&mut self, eval: impl FnOnce(&str) -> Option<String>) -> bool {
        if !self.dirty {
            return false;
        }
        self.run_eval(eval)
    }

    fn run_eval(&mut self, eval: impl FnOnce(&str) -> Option<String>) -> bool {
        self.dirty = false;
        self.deadline = None;

        if self.pending.is_empty() {
            self.current = None;
            return false;
        }

        let Some(value) = eval(&self.pending) else {
            return false;
        };

        let line = format!("{} = {}", self.pending, value);
        if let Some(previous) = self.current.replace(line) {
            self.history.insert(0, previous);
            self.history.truncate(self.history_limit);
        }
        true
    }

    /// The value of the latest evaluation, without the expression prefix.
    pub fn current_value(&self) -> Option<&str> {
        self.current
            .as_deref()
            .and_then(|line| line.split_once(" = "))
            .map(|(_, value)| value)
    }

    /// Display lines, newest first: the current result above the history.
    /// The current line carries the display prefix when one is configured.
    pub fn result_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.history.len() + 1);
        if let Some(current) = &self.current {
            match &self.display_prefix {
                Some(prefix) => lines.push(format!("{} > {}", prefix, current)),
                None => lines.push(current.clone()),
            }
        }
        lines.extend(self.history.iter().cloned());
        lines
    }

    pub fn clear(&mut self) {
        self.dirty = false;
        self.deadline = None;
        self.pending.clear();
        self.current = None;
    }
}

/// Evaluate an expression with the configured calculator command.
///
/// The expression is single-quoted for the shell; embedded quotes are
/// escaped rather than rejected.
pub fn evaluate_expression(calc_command: &str, expr: &str) -> Option<String> {
    let quoted = expr.replace('\'', "'\\''");
    exec::capture_output(&format!("{} '{}'", calc_command, quoted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn no_evaluation_before_deadline() {
        let base = Instant::now();
        let mut calc = Calculator::new(Duration::from_millis(400), 10, None);
        calc.mark_dirty("2+2", base);

        assert!(!calc.update_if_ready(at(base, 100), |_| panic!("too early")));
        assert!(calc.deadline().is_some());
    }

    #[test]
    fn burst_of_edits_evaluates_once_with_latest() {
        let base = Instant::now();
        let mut calc = Calculator::new(Duration::from_millis(400), 10, None);
        calc.mark_dirty("2", base);
        calc.mark_dirty("2+", at(base, 100));
        calc.mark_dirty("2+2", at(base, 200));

        let calls = Cell::new(0);
        assert!(calc.update_if_ready(at(base, 601), |expr| {
            calls.set(calls.get() + 1);
            assert_eq!(expr, "2+2");
            Some("4".to_string())
        }));
        assert_eq!(calls.get(), 1);

        // Settled: nothing further to evaluate.
        assert!(!calc.update_if_ready(at(base, 2000), |_| panic!("not dirty")));
        assert_eq!(calc.result_lines(), vec!["2+2 = 4"]);
        assert_eq!(calc.current_value(), Some("4"));
    }

    #[test]
    fn force_update_skips_deadline() {
        let base = Instant::now();
        let mut calc = Calculator::new(Duration::from_millis(400), 10, None);
        calc.mark_dirty("1+1", base);

        assert!(calc.force_update(|_| Some("2".to_string())));
        assert_eq!(calc.current_value(), Some("2"));
    }

    #[test]
    fn previous_result_moves_into_history() {
        let base = Instant::now();
        let mut calc = Calculator::new(Duration::ZERO, 2, None);

        for (expr, value) in [("1+1", "2"), ("2+2", "4"), ("3+3", "6"), ("4+4", "8")] {
            calc.mark_dirty(expr, base);
            calc.update_if_ready(base, |_| Some(value.to_string()));
        }

        // Current plus a history capped at two lines, newest first.
        assert_eq!(calc.result_lines(), vec!["4+4 = 8", "3+3 = 6", "2+2 = 4"]);
    }

    #[test]
    fn display_prefix_decorates_current_line_only() {
        let base = Instant::now();
        let mut calc = Calculator::new(Duration::ZERO, 10, Some("Calc".to_string()));

        calc.mark_dirty("1+1", base);
        calc.update_if_ready(base, |_| Some("2".to_string()));
        calc.mark_dirty("2+2", base);
        calc.update_if_ready(base, |_| Some("4".to_string()));

        assert_eq!(calc.result_lines(), vec!["Calc > 2+2 = 4", "1+1 = 2"]);
        // The prefix is display-only; the value stays parseable.
        assert_eq!(calc.current_value(), Some("4"));
    }

    #[test]
    fn empty_expression_clears_current() {
        let base = Instant::now();
        let mut calc = Calculator::new(Duration::ZERO, 10, None);
        calc.mark_dirty("5*5", base);
        calc.update_if_ready(base, |_| Some("25".to_string()));

        calc.mark_dirty("", base);
        assert!(!calc.update_if_ready(base, |_| panic!("empty expression")));
        assert!(calc.current_value().is_none());
    }

    #[test]
    fn failed_evaluation_keeps_previous_result() {
        let base = Instant::now();
        let mut calc = Calculator::new(Duration::ZERO, 10, None);
        calc.mark_dirty("2+2", base);
        calc.update_if_ready(base, |_| Some("4".to_string()));

        calc.mark_dirty("2+!", base);
        assert!(!calc.update_if_ready(base, |_| None));
        assert_eq!(calc.current_value(), Some("4"));
    }

    #[test]
    fn shell_quoting_survives_embedded_quotes() {
        let out = evaluate_expression("printf '%s'", "it's");
        assert_eq!(out.as_deref(), Some("it's"));
    }
}
