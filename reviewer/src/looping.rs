//! Recursive fix loop: review → fix → re-review until clean or out of passes.

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::status::{Status, StatusLine, classify, parse_status_line};
use crate::core::types::PassResult;
use crate::error::ConfigError;
use crate::pass::PassRunner;
use crate::prompt::{first_pass_prompt, re_review_prompt};

/// Smallest accepted pass bound.
pub const MIN_PASSES: u32 = 1;
/// Largest accepted pass bound.
pub const MAX_PASSES: u32 = 100;
/// Pass bound used when none is configured.
pub const DEFAULT_MAX_PASSES: u32 = 5;

/// Reason why `run_fix_loop` stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStop {
    /// The agent declared zero remaining critical issues.
    AllClear,
    /// Every pass ran and the last one was not all-clear.
    MaxPassesReached,
    /// A pass made no edits without declaring all-clear; another pass
    /// would see the same files and could not change the outcome.
    StoppedNoEdits,
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub stop: LoopStop,
    pub passes_executed: u32,
    /// Status of the last executed pass.
    pub final_status: Status,
    /// The last pass's status line, when it followed the convention.
    pub final_status_line: Option<StatusLine>,
    pub last_result: PassResult,
}

impl LoopOutcome {
    fn new(stop: LoopStop, passes_executed: u32, last_result: PassResult) -> Self {
        Self {
            stop,
            passes_executed,
            final_status: classify(&last_result.last_text),
            final_status_line: parse_status_line(&last_result.last_text),
            last_result,
        }
    }
}

/// Reject pass bounds outside `MIN_PASSES..=MAX_PASSES`.
pub fn validate_max_passes(max_passes: u32) -> Result<u32, ConfigError> {
    if (MIN_PASSES..=MAX_PASSES).contains(&max_passes) {
        Ok(max_passes)
    } else {
        Err(ConfigError::new(format!(
            "max passes must be between {MIN_PASSES} and {MAX_PASSES}, got {max_passes}"
        )))
    }
}

/// Run passes until the agent is all-clear, stops making edits, or
/// `max_passes` passes have run.
///
/// Pass 1 sends `instruction` behind the fix directive. Every later pass is a
/// re-review scoped to the files the previous pass edited. `on_pass` sees each
/// result as soon as its pass finishes.
///
/// Invalid `max_passes` fails before any pass runs. Pass failures abort the
/// loop immediately and are not retried.
#[instrument(skip_all, fields(max_passes = max_passes))]
pub fn run_fix_loop<P: PassRunner, F: FnMut(u32, &PassResult, Status)>(
    runner: &mut P,
    skill: &str,
    instruction: &str,
    max_passes: u32,
    mut on_pass: F,
) -> Result<LoopOutcome> {
    let max_passes = validate_max_passes(max_passes)?;

    let prompt = first_pass_prompt(skill, instruction).context("render first pass prompt")?;
    let mut current = runner.run_pass(&prompt).context("pass 1")?;
    report(1, &current, &mut on_pass);

    for pass in 2..=max_passes {
        if !current.made_edits() {
            let stop = match classify(&current.last_text) {
                Status::AllClear => LoopStop::AllClear,
                Status::CriticalRemaining | Status::Unknown => LoopStop::StoppedNoEdits,
            };
            info!(pass = pass - 1, ?stop, "previous pass made no edits");
            return Ok(LoopOutcome::new(stop, pass - 1, current));
        }

        let prompt = re_review_prompt(skill, pass, &current.edited_files)
            .with_context(|| format!("render pass {pass} prompt"))?;
        current = runner
            .run_pass(&prompt)
            .with_context(|| format!("pass {pass}"))?;
        report(pass, &current, &mut on_pass);
    }

    let stop = match classify(&current.last_text) {
        Status::AllClear => LoopStop::AllClear,
        Status::CriticalRemaining | Status::Unknown => LoopStop::MaxPassesReached,
    };
    info!(?stop, "pass budget exhausted");
    Ok(LoopOutcome::new(stop, max_passes, current))
}

fn report<F: FnMut(u32, &PassResult, Status)>(pass: u32, result: &PassResult, on_pass: &mut F) {
    let status = classify(&result.last_text);
    info!(
        pass,
        edits = result.edit_count,
        files = result.edited_files.len(),
        %status,
        "pass complete"
    );
    on_pass(pass, result, status);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::test_support::{ScriptedPasses, pass_result};

    fn run(passes: &mut ScriptedPasses, max_passes: u32) -> Result<LoopOutcome> {
        run_fix_loop(passes, "", "review the diff", max_passes, |_, _, _| {})
    }

    #[test]
    fn all_clear_after_fix_then_clean_re_review() {
        let mut passes = ScriptedPasses::new(vec![
            pass_result(2, &["a.ts"], "fixed\nCRITICAL_REMAINING: 1"),
            pass_result(0, &[], "verified\nALL_CLEAR"),
        ]);

        let outcome = run(&mut passes, 5).expect("loop");

        assert_eq!(outcome.stop, LoopStop::AllClear);
        assert_eq!(outcome.passes_executed, 2);
        assert_eq!(passes.calls(), 2);
        assert_eq!(outcome.final_status_line, Some(StatusLine::AllClear));
    }

    #[test]
    fn max_passes_reached_without_extra_call() {
        let mut passes = ScriptedPasses::new(vec![
            pass_result(1, &["a.ts"], "CRITICAL_REMAINING: 2"),
            pass_result(1, &["a.ts"], "CRITICAL_REMAINING: 2"),
            pass_result(1, &["a.ts"], "CRITICAL_REMAINING: 2"),
            pass_result(1, &["a.ts"], "CRITICAL_REMAINING: 2"),
        ]);

        let outcome = run(&mut passes, 3).expect("loop");

        assert_eq!(outcome.stop, LoopStop::MaxPassesReached);
        assert_eq!(outcome.passes_executed, 3);
        assert_eq!(passes.calls(), 3);
        assert_eq!(outcome.final_status, Status::CriticalRemaining);
        assert_eq!(outcome.final_status_line, Some(StatusLine::Critical(2)));
    }

    #[test]
    fn zero_edits_with_non_conforming_status_stops() {
        let mut passes = ScriptedPasses::new(vec![pass_result(
            0,
            &[],
            "looks fine, CRITICAL_REMAINING: 1",
        )]);

        let outcome = run(&mut passes, 5).expect("loop");

        assert_eq!(outcome.stop, LoopStop::StoppedNoEdits);
        assert_eq!(outcome.passes_executed, 1);
        assert_eq!(passes.calls(), 1);
        assert_eq!(outcome.final_status, Status::Unknown);
    }

    #[test]
    fn zero_edits_with_declared_criticals_stops() {
        let mut passes =
            ScriptedPasses::new(vec![pass_result(0, &[], "cannot fix\nCRITICAL_REMAINING: 4")]);
        let outcome = run(&mut passes, 5).expect("loop");
        assert_eq!(outcome.stop, LoopStop::StoppedNoEdits);
        assert_eq!(passes.calls(), 1);
    }

    #[test]
    fn clean_first_pass_without_edits_is_all_clear() {
        let mut passes = ScriptedPasses::new(vec![pass_result(0, &[], "nothing to do\nALL_CLEAR")]);
        let outcome = run(&mut passes, 5).expect("loop");
        assert_eq!(outcome.stop, LoopStop::AllClear);
        assert_eq!(passes.calls(), 1);
    }

    #[test]
    fn all_clear_on_final_pass_wins() {
        let mut passes = ScriptedPasses::new(vec![
            pass_result(1, &["a.ts"], "CRITICAL_REMAINING: 1"),
            pass_result(1, &["a.ts"], "CRITICAL_REMAINING: 0"),
        ]);
        let outcome = run(&mut passes, 2).expect("loop");
        assert_eq!(outcome.stop, LoopStop::AllClear);
        assert_eq!(outcome.passes_executed, 2);
    }

    #[test]
    fn single_pass_bound_never_re_reviews() {
        let mut passes = ScriptedPasses::new(vec![pass_result(3, &["a.ts"], "CRITICAL_REMAINING: 1")]);
        let outcome = run(&mut passes, 1).expect("loop");
        assert_eq!(outcome.stop, LoopStop::MaxPassesReached);
        assert_eq!(passes.calls(), 1);
    }

    #[test]
    fn invalid_bounds_fail_before_any_pass() {
        for bad in [0, 101, u32::MAX] {
            let mut passes = ScriptedPasses::new(Vec::new());
            let err = run(&mut passes, bad).unwrap_err();
            assert!(err.downcast_ref::<ConfigError>().is_some(), "bound {bad}");
            assert_eq!(passes.calls(), 0);
        }
        assert_eq!(validate_max_passes(1), Ok(1));
        assert_eq!(validate_max_passes(100), Ok(100));
    }

    #[test]
    fn re_review_prompt_is_scoped_to_previous_edits() {
        let mut passes = ScriptedPasses::new(vec![
            pass_result(2, &["a.ts", "b.ts"], "CRITICAL_REMAINING: 1"),
            pass_result(1, &[], "CRITICAL_REMAINING: 1"),
            pass_result(0, &[], "ALL_CLEAR"),
        ]);

        run_fix_loop(&mut passes, "SKILL", "review the diff", 5, |_, _, _| {}).expect("loop");

        assert!(passes.prompts[0].contains("review the diff"));
        assert!(passes.prompts[0].contains("<directive>"));
        assert!(passes.prompts[1].contains("- a.ts"));
        assert!(passes.prompts[1].contains("- b.ts"));
        assert!(!passes.prompts[1].contains("review the diff"));
        assert!(passes.prompts[2].contains("all files you just modified"));
        assert!(passes.prompts.iter().all(|prompt| prompt.starts_with("SKILL")));
    }

    #[test]
    fn engine_failure_aborts_without_retry() {
        let mut passes = ScriptedPasses::failing_after(
            vec![pass_result(1, &["a.ts"], "CRITICAL_REMAINING: 1")],
            "stream closed",
        );

        let err = run(&mut passes, 5).unwrap_err();

        assert!(err.downcast_ref::<EngineError>().is_some());
        assert_eq!(passes.calls(), 2);
        assert!(format!("{err:#}").contains("pass 2"));
    }

    #[test]
    fn on_pass_sees_every_pass_in_order() {
        let mut passes = ScriptedPasses::new(vec![
            pass_result(1, &["a.ts"], "CRITICAL_REMAINING: 1"),
            pass_result(0, &[], "ALL_CLEAR"),
        ]);
        let mut seen = Vec::new();
        run_fix_loop(&mut passes, "", "review", 5, |pass, result, status| {
            seen.push((pass, result.edit_count, status));
        })
        .expect("loop");
        assert_eq!(
            seen,
            vec![(1, 1, Status::CriticalRemaining), (2, 0, Status::AllClear)]
        );
    }
}
