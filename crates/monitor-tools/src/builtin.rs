//! Seed data for the built-in analyzer tools.

use monitor_core::model::{ExitClassifier, ToolDescriptor};
use monitor_core::status::Status;
use monitor_core::styled_text::Color;

/// One built-in tool plus the languages (from `classify::classify`) it
/// applies to. An empty `languages` list paired with `descriptor.universal
/// == true` means "every file".
pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub languages: Vec<&'static str>,
}

fn descriptor(
    name: &str,
    color: Color,
    argv: &[&str],
    timeout_s: u64,
    version_tag: u32,
    classifier: ExitClassifier,
    universal: bool,
) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        color,
        argv_template: argv.iter().map(|s| s.to_string()).collect(),
        timeout_s,
        version_tag,
        classifier,
        universal,
    }
}

/// The full set of tools shipped with the monitor, before `which`-based
/// availability probing removes the ones whose executable is missing.
pub fn seed_tools() -> Vec<RegisteredTool> {
    vec![
        RegisteredTool {
            descriptor: descriptor(
                "python_syntax",
                Color::Rgb(86, 156, 214),
                &["python3", "-c", "import ast,sys; ast.parse(open(sys.argv[1]).read())", "{path}"],
                10,
                1,
                ExitClassifier::ZeroIsOk,
                false,
            ),
            languages: vec!["python"],
        },
        RegisteredTool {
            descriptor: descriptor(
                "ruff",
                Color::Rgb(214, 93, 14),
                &["ruff", "check", "--output-format=concise", "{path}"],
                15,
                1,
                ExitClassifier::ZeroOkStdoutProblem,
                false,
            ),
            languages: vec!["python"],
        },
        RegisteredTool {
            descriptor: descriptor(
                "black",
                Color::Rgb(0, 0, 0),
                &["black", "--check", "--diff", "{path}"],
                15,
                1,
                ExitClassifier::Table(vec![(0, Status::Ok), (1, Status::Problem)]),
                false,
            ),
            languages: vec!["python"],
        },
        RegisteredTool {
            descriptor: descriptor(
                "rustfmt_check",
                Color::Rgb(222, 165, 132),
                &["rustfmt", "--check", "--edition", "2024", "{path}"],
                15,
                1,
                ExitClassifier::ZeroIsOk,
                false,
            ),
            languages: vec!["rust"],
        },
        RegisteredTool {
            descriptor: descriptor(
                "cargo_check",
                Color::Rgb(222, 165, 132),
                &["cargo", "check", "--message-format=short", "--quiet"],
                120,
                1,
                ExitClassifier::ZeroIsOk,
                false,
            ),
            languages: vec!["rust"],
        },
        RegisteredTool {
            descriptor: descriptor(
                "shellcheck",
                Color::Rgb(4, 148, 178),
                &["shellcheck", "--format=gcc", "{path}"],
                10,
                1,
                ExitClassifier::ZeroOkStdoutProblem,
                false,
            ),
            languages: vec!["shell"],
        },
        RegisteredTool {
            descriptor: descriptor(
                "tidy",
                Color::Rgb(227, 76, 38),
                &["tidy", "-quiet", "-errors", "{path}"],
                10,
                1,
                ExitClassifier::Table(vec![(0, Status::Ok), (1, Status::Problem), (2, Status::Problem)]),
                false,
            ),
            languages: vec!["html"],
        },
        RegisteredTool {
            descriptor: descriptor(
                "file_kind",
                Color::Rgb(120, 120, 120),
                &["file", "--brief", "{path}"],
                5,
                1,
                ExitClassifier::ZeroIsOk,
                true,
            ),
            languages: vec![],
        },
        RegisteredTool {
            descriptor: descriptor(
                "git_blame",
                Color::Rgb(150, 100, 200),
                &["git", "blame", "--line-porcelain", "{path}"],
                20,
                1,
                ExitClassifier::ZeroIsOk,
                true,
            ),
            languages: vec![],
        },
        RegisteredTool {
            descriptor: descriptor(
                "git_log",
                Color::Rgb(150, 100, 200),
                &["git", "log", "--max-count=20", "--oneline", "--", "{path}"],
                20,
                1,
                ExitClassifier::ZeroIsOk,
                true,
            ),
            languages: vec![],
        },
        RegisteredTool {
            descriptor: descriptor(
                "wc",
                Color::Rgb(120, 120, 120),
                &["wc", "-l", "-w", "-c", "{path}"],
                5,
                1,
                ExitClassifier::ZeroIsOk,
                true,
            ),
            languages: vec![],
        },
        RegisteredTool {
            descriptor: descriptor(
                "contents",
                Color::Rgb(200, 200, 200),
                &["cat", "{path}"],
                5,
                1,
                ExitClassifier::ZeroIsOk,
                true,
            ),
            languages: vec![],
        },
        RegisteredTool {
            descriptor: descriptor(
                "metadata",
                Color::Rgb(120, 120, 120),
                &["stat", "{path}"],
                5,
                1,
                ExitClassifier::ZeroIsOk,
                true,
            ),
            languages: vec![],
        },
    ]
}
