use std::{env, path::PathBuf};

use anyhow::{Result, anyhow};

const USAGE: &str = concat!(
    "usage: fieldpilot [--config <path>] <command>\n",
    "  investigate <subject-id>\n",
    "  recommend <subject-id> [--session <session-id>]\n",
    "  show <session-id>\n",
    "  latest <subject-id>\n",
    "  confirm <subject-id> <hypothesis-id>[,<hypothesis-id>...] [--notes <text>]"
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Investigate {
        subject_id: String,
    },
    Recommend {
        subject_id: String,
        session_id: Option<String>,
    },
    Show {
        session_id: String,
    },
    Latest {
        subject_id: String,
    },
    Confirm {
        subject_id: String,
        hypothesis_ids: Vec<String>,
        notes: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub config_path: PathBuf,
    pub command: Command,
}

pub fn invocation_from_args() -> Result<Invocation> {
    parse_args(env::args().skip(1))
}

pub fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Invocation> {
    let mut args = args.into_iter();
    let mut config_path = None;
    let mut positional = Vec::new();
    let mut session_id = None;
    let mut notes = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = Some(PathBuf::from(flag_value(&mut args, "--config")?)),
            "--session" => session_id = Some(flag_value(&mut args, "--session")?),
            "--notes" => notes = Some(flag_value(&mut args, "--notes")?),
            "-h" | "--help" => return Err(anyhow!("{USAGE}")),
            other if other.starts_with("--") => {
                return Err(anyhow!("unknown argument: {other}\n{USAGE}"));
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let name = positional
        .next()
        .ok_or_else(|| anyhow!("missing command\n{USAGE}"))?;
    let mut operand = |what: &str| {
        positional
            .next()
            .ok_or_else(|| anyhow!("{name}: missing {what}\n{USAGE}"))
    };

    let command = match name.as_str() {
        "investigate" => Command::Investigate {
            subject_id: operand("subject id")?,
        },
        "recommend" => Command::Recommend {
            subject_id: operand("subject id")?,
            session_id: session_id.take(),
        },
        "show" => Command::Show {
            session_id: operand("session id")?,
        },
        "latest" => Command::Latest {
            subject_id: operand("subject id")?,
        },
        "confirm" => {
            let subject_id = operand("subject id")?;
            let hypothesis_ids: Vec<String> = operand("hypothesis ids")?
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
            Command::Confirm {
                subject_id,
                hypothesis_ids,
                notes: notes.take().unwrap_or_default(),
            }
        }
        other => return Err(anyhow!("unknown command: {other}\n{USAGE}")),
    };

    if let Some(extra) = positional.next() {
        return Err(anyhow!("unexpected argument: {extra}\n{USAGE}"));
    }
    if session_id.is_some() {
        return Err(anyhow!("--session only applies to recommend"));
    }
    if notes.is_some() {
        return Err(anyhow!("--notes only applies to confirm"));
    }

    Ok(Invocation {
        config_path: config_path.unwrap_or_else(|| PathBuf::from("./fieldpilot.jsonc")),
        command,
    })
}

fn flag_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| anyhow!("missing value for {flag}"))
}
