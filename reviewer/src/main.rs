//! Command-line entry point: run a review pass, or a bounded fix loop.
//!
//! Rendered agent output goes to stdout; diagnostics (`RUST_LOG`) and the
//! final notice go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;

use reviewer::core::sanitize::sanitize_prompt;
use reviewer::core::status::classify;
use reviewer::engine::PermissionMode;
use reviewer::engine::cli::CliEngine;
use reviewer::error::{ConfigError, exit_code_for};
use reviewer::exit_codes;
use reviewer::io::config::{ReviewerConfig, load_config, resolve_config_path};
use reviewer::io::skill::load_skill_text;
use reviewer::logging;
use reviewer::looping::{LoopOutcome, LoopStop, run_fix_loop, validate_max_passes};
use reviewer::pass::{PassExecutor, PassRunner};
use reviewer::prompt::single_pass_prompt;
use reviewer::render::TerminalRenderer;

#[derive(Parser, Debug)]
#[command(
    name = "reviewer",
    version,
    about = "Review code with an agent and optionally loop review → fix → re-review"
)]
struct Cli {
    /// What to review (e.g. "review the staged diff").
    instruction: String,

    /// Keep fixing and re-reviewing until the agent reports ALL_CLEAR.
    #[arg(long)]
    fix_recursive: bool,

    /// Upper bound on passes with --fix-recursive (1..=100).
    #[arg(long, value_name = "N")]
    max_passes: Option<u32>,

    /// Skill file prepended to every prompt. Repeatable.
    #[arg(long = "skill", value_name = "PATH")]
    skills: Vec<PathBuf>,

    /// Config file (default: .reviewer/config.toml in the working directory).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Working directory for the agent.
    #[arg(long, value_name = "DIR")]
    cwd: Option<PathBuf>,

    #[arg(long)]
    model: Option<String>,

    /// Upper bound on agent turns per pass.
    #[arg(long, value_name = "N")]
    max_turns: Option<u32>,

    /// One of default, acceptEdits, bypassPermissions.
    #[arg(long, value_name = "MODE", value_parser = parse_permission_mode)]
    permission_mode: Option<PermissionMode>,

    /// Append every raw agent stream line to call-NNN.jsonl files here.
    #[arg(long, value_name = "DIR")]
    stream_log_dir: Option<PathBuf>,

    /// Print the agent's thinking blocks.
    #[arg(long)]
    show_thinking: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut ReviewerConfig) {
        if let Some(model) = &self.model {
            config.agent.model = Some(model.clone());
        }
        if let Some(max_turns) = self.max_turns {
            config.agent.max_turns = Some(max_turns);
        }
        if let Some(mode) = self.permission_mode {
            config.agent.permission_mode = mode;
        }
        if let Some(dir) = &self.stream_log_dir {
            config.agent.stream_log_dir = Some(dir.clone());
        }
        if let Some(max_passes) = self.max_passes {
            config.fix_loop.max_passes = max_passes;
        }
    }
}

fn parse_permission_mode(value: &str) -> Result<PermissionMode, String> {
    match value {
        "default" => Ok(PermissionMode::Default),
        "acceptEdits" => Ok(PermissionMode::AcceptEdits),
        "bypassPermissions" => Ok(PermissionMode::BypassPermissions),
        other => Err(format!(
            "unknown permission mode `{other}` (expected default, acceptEdits, bypassPermissions)"
        )),
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            let _ = err.print();
            std::process::exit(exit_codes::INVALID);
        }
    };
    logging::init();
    if let Err(err) = run(&cli) {
        eprintln!("error: {:#}", err);
        std::process::exit(exit_code_for(&err));
    }
}

fn run(cli: &Cli) -> Result<()> {
    if sanitize_prompt(&cli.instruction).trim().is_empty() {
        return Err(ConfigError::new("instruction is empty after removing control characters").into());
    }
    let root = match &cli.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("resolve working directory")?,
    };
    let config_path = resolve_config_path(cli.config.as_deref(), &root)?;
    let mut config = load_config(&config_path)?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    let max_passes = validate_max_passes(config.fix_loop.max_passes)?;
    if !cli.fix_recursive && cli.max_passes.is_some() {
        warn!("--max-passes has no effect without --fix-recursive");
    }

    let skill = load_skill_text(cli.skills.as_slice())
        .map_err(|err| ConfigError::new(format!("{err:#}")))?;

    let engine = CliEngine::new(config.agent.command.clone(), config.pass_timeout())?
        .with_stream_log_dir(config.agent.stream_log_dir.clone());
    let mut renderer = TerminalRenderer::stdout().with_thinking(cli.show_thinking);
    let mut executor = PassExecutor::new(
        &engine,
        &mut renderer,
        config.edit_tracker(),
        config.engine_config(cli.cwd.clone()),
    );

    if !cli.fix_recursive {
        let prompt = single_pass_prompt(&skill, &cli.instruction)?;
        let result = executor.run_pass(&prompt)?;
        eprintln!(
            "review finished: {} edits, status {}",
            result.edit_count,
            classify(&result.last_text)
        );
        return Ok(());
    }

    let outcome = run_fix_loop(
        &mut executor,
        &skill,
        &cli.instruction,
        max_passes,
        |pass, result, status| {
            eprintln!(
                "pass {pass}: {} edits across {} files, status {status}",
                result.edit_count,
                result.edited_files.len()
            );
        },
    )?;
    eprintln!("{}", outcome_notice(&outcome));
    Ok(())
}

/// Notice printed after the loop.
fn outcome_notice(outcome: &LoopOutcome) -> String {
    let last_status = outcome
        .final_status_line
        .map(|line| line.to_string())
        .unwrap_or_else(|| "no status line".to_string());
    match outcome.stop {
        LoopStop::AllClear => format!("✓ all clear after {} passes", outcome.passes_executed),
        LoopStop::MaxPassesReached => {
            let mut notice = format!(
                "warning: reached max passes ({}); issues may remain (last status: {last_status})",
                outcome.passes_executed
            );
            let files = &outcome.last_result.edited_files;
            if !files.is_empty() {
                let files: Vec<&str> = files.iter().map(String::as_str).collect();
                notice.push_str(&format!("\nlast pass edited: {}", files.join(", ")));
            }
            notice
        }
        LoopStop::StoppedNoEdits => format!(
            "warning: pass {} made no edits; issues may remain (last status: {last_status})",
            outcome.passes_executed
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use reviewer::core::status::{Status, StatusLine};
    use reviewer::core::types::PassResult;

    fn outcome(stop: LoopStop, passes: u32, line: Option<StatusLine>) -> LoopOutcome {
        LoopOutcome {
            stop,
            passes_executed: passes,
            final_status: Status::Unknown,
            final_status_line: line,
            last_result: PassResult::default(),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_single_pass() {
        let cli = Cli::parse_from(["reviewer", "review the diff"]);
        assert_eq!(cli.instruction, "review the diff");
        assert!(!cli.fix_recursive);
        assert_eq!(cli.max_passes, None);
        assert!(cli.skills.is_empty());
    }

    #[test]
    fn parse_fix_recursive_with_overrides() {
        let cli = Cli::parse_from([
            "reviewer",
            "--fix-recursive",
            "--max-passes",
            "3",
            "--skill",
            "a.md",
            "--skill",
            "b.md",
            "--permission-mode",
            "bypassPermissions",
            "review",
        ]);
        assert!(cli.fix_recursive);
        assert_eq!(cli.max_passes, Some(3));
        assert_eq!(cli.skills, vec![PathBuf::from("a.md"), PathBuf::from("b.md")]);
        assert_eq!(cli.permission_mode, Some(PermissionMode::BypassPermissions));
    }

    #[test]
    fn unknown_permission_mode_is_rejected() {
        assert!(Cli::try_parse_from(["reviewer", "--permission-mode", "yolo", "review"]).is_err());
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from(["reviewer", "--model", "opus", "--max-passes", "9", "review"]);
        let mut config = ReviewerConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.agent.model.as_deref(), Some("opus"));
        assert_eq!(config.fix_loop.max_passes, 9);
        assert_eq!(config.agent.permission_mode, PermissionMode::AcceptEdits);
    }

    #[test]
    fn out_of_range_max_passes_fails_validation() {
        let cli = Cli::parse_from(["reviewer", "--fix-recursive", "--max-passes", "0", "review"]);
        let mut config = ReviewerConfig::default();
        cli.apply_overrides(&mut config);
        assert!(config.validate().is_err());
    }

    #[test]
    fn notices_name_the_last_status() {
        assert_eq!(
            outcome_notice(&outcome(LoopStop::AllClear, 2, Some(StatusLine::AllClear))),
            "✓ all clear after 2 passes"
        );
        let notice = outcome_notice(&outcome(
            LoopStop::MaxPassesReached,
            5,
            Some(StatusLine::Critical(2)),
        ));
        assert!(notice.contains("issues may remain"));
        assert!(notice.contains("CRITICAL_REMAINING: 2"));
        let notice = outcome_notice(&outcome(LoopStop::StoppedNoEdits, 1, None));
        assert!(notice.contains("pass 1 made no edits"));
        assert!(notice.contains("no status line"));
    }

    #[test]
    fn max_passes_notice_lists_last_edited_files() {
        let mut reached = outcome(LoopStop::MaxPassesReached, 3, Some(StatusLine::Critical(1)));
        reached.last_result.edited_files = ["src/a.rs".to_string(), "src/b.rs".to_string()]
            .into_iter()
            .collect();
        let notice = outcome_notice(&reached);
        assert!(notice.ends_with("last pass edited: src/a.rs, src/b.rs"));
    }

    /// Agent that counts its calls in `calls.log`, edits a file, and always
    /// reports one remaining critical issue.
    #[cfg(unix)]
    fn scripted_agent_config(dir: &std::path::Path) -> PathBuf {
        let script = r#"cat >/dev/null
echo call >> "CALLS"
echo '{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Edit","input":{"file_path":"src/a.rs"}}]}}'
echo '{"type":"assistant","message":{"content":[{"type":"text","text":"CRITICAL_REMAINING: 1"}]}}'
"#
        .replace("CALLS", &dir.join("calls.log").display().to_string());
        let config = format!(
            "[agent]\ncommand = [\"sh\", \"-c\", '''\n{script}''', \"agent\"]\npass_timeout_secs = 20\n"
        );
        let path = dir.join("config.toml");
        std::fs::write(&path, config).expect("write config");
        path
    }

    #[cfg(unix)]
    fn agent_calls(dir: &std::path::Path) -> usize {
        std::fs::read_to_string(dir.join("calls.log"))
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }

    #[cfg(unix)]
    fn cli_with_config(config: &std::path::Path, extra: &[&str]) -> Cli {
        let config = config.to_str().expect("utf8 path");
        let mut args = vec!["reviewer", "--config", config];
        args.extend_from_slice(extra);
        Cli::parse_from(args)
    }

    #[cfg(unix)]
    #[test]
    fn without_fix_recursive_runs_exactly_one_pass() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = scripted_agent_config(temp.path());

        run(&cli_with_config(&config, &["review the diff"])).expect("run");

        assert_eq!(agent_calls(temp.path()), 1);
    }

    #[cfg(unix)]
    #[test]
    fn fix_recursive_re_reviews_until_max_passes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = scripted_agent_config(temp.path());

        run(&cli_with_config(
            &config,
            &["--fix-recursive", "--max-passes", "3", "review the diff"],
        ))
        .expect("run");

        assert_eq!(agent_calls(temp.path()), 3);
    }

    #[cfg(unix)]
    #[test]
    fn control_only_instruction_is_config_error_before_agent_starts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = scripted_agent_config(temp.path());

        let err = run(&cli_with_config(&config, &["--fix-recursive", "\u{1}\u{2}\u{7f}"]))
            .unwrap_err();

        assert!(err.downcast_ref::<ConfigError>().is_some());
        assert_eq!(exit_code_for(&err), exit_codes::INVALID);
        assert_eq!(agent_calls(temp.path()), 0);
    }
}
