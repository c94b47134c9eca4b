//! Line commands
//!
//! One command per line; the first word picks the command and the rest
//! are its arguments. Motion and leg commands go to the selected robot.

use anyhow::{anyhow, bail, Result};
use serde_json::{json, Value};

use phi_core::Operation;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect,
    Disconnect,
    Status,
    Select(String),
    Call {
        operation: Operation,
        args: Vec<Value>,
    },
    Vector(f64, f64),
    Head(f64, f64),
    Say(String),
    Keys,
    Decide(bool),
    Log(Option<String>),
    Clear {
        channel: String,
        archived: bool,
    },
    Archive(usize),
    Reset,
    Help,
    Quit,
}

const DEFAULT_ARCHIVE_LIMIT: usize = 20;

pub const HELP: &str = "\
connect | disconnect | status
select <robot>                  pack1, pack2, one, two
call <operation> [args..]       e.g. call pushup, call set_vector 0.5 0
vector <linear> <angular>
head <yaw> <pitch>
lift <leg> <lift> <ms>
point <leg> <x> <y> <z> <ms>
say <phrase>                    e.g. say pack one walk
keys                            W/S/A/D and arrows, Esc to leave
yes | no                        answer the oldest pending decision
log [channel] | archive [n]
clear <channel> [all]           all also drops the channel's archive
reset | help | quit";

impl Command {
    /// Parse one input line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();

        let command = match head.to_lowercase().as_str() {
            "connect" => Command::Connect,
            "disconnect" => Command::Disconnect,
            "status" => Command::Status,
            "select" | "control" => Command::Select(one(&rest, "select <robot>")?.to_string()),
            "call" => {
                let (name, args) = rest
                    .split_first()
                    .ok_or_else(|| anyhow!("usage: call <operation> [args..]"))?;
                Command::Call {
                    operation: name.parse()?,
                    args: args.iter().map(|a| literal(a)).collect(),
                }
            }
            "vector" => {
                let [linear, angular] = numbers::<2>(&rest, "vector <linear> <angular>")?;
                Command::Vector(linear, angular)
            }
            "head" => {
                let [yaw, pitch] = numbers::<2>(&rest, "head <yaw> <pitch>")?;
                Command::Head(yaw, pitch)
            }
            "lift" => {
                let [leg, lift, ms] = numbers::<3>(&rest, "lift <leg> <lift> <ms>")?;
                Command::Call {
                    operation: Operation::LiftLeg,
                    args: vec![number(leg), number(lift), number(ms)],
                }
            }
            "point" => {
                let [leg, x, y, z, ms] = numbers::<5>(&rest, "point <leg> <x> <y> <z> <ms>")?;
                Command::Call {
                    operation: Operation::TargetPoint,
                    args: vec![number(leg), json!([x, y, z]), number(ms)],
                }
            }
            "say" => {
                if rest.is_empty() {
                    bail!("usage: say <phrase>");
                }
                Command::Say(rest.join(" "))
            }
            "keys" => Command::Keys,
            "yes" | "y" => Command::Decide(true),
            "no" | "n" => Command::Decide(false),
            "log" => Command::Log(rest.first().map(|c| c.to_string())),
            "clear" => match rest.as_slice() {
                [channel] => Command::Clear {
                    channel: channel.to_string(),
                    archived: false,
                },
                [channel, all] if all.eq_ignore_ascii_case("all") => Command::Clear {
                    channel: channel.to_string(),
                    archived: true,
                },
                _ => bail!("usage: clear <channel> [all]"),
            },
            "archive" => match rest.first() {
                Some(n) => Command::Archive(n.parse().map_err(|_| anyhow!("usage: archive [n]"))?),
                None => Command::Archive(DEFAULT_ARCHIVE_LIMIT),
            },
            "reset" => Command::Reset,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => bail!("Unknown command '{}'. Type help.", other),
        };

        Ok(Some(command))
    }
}

fn one<'a>(rest: &[&'a str], usage: &str) -> Result<&'a str> {
    match rest {
        [word] => Ok(*word),
        _ => bail!("usage: {}", usage),
    }
}

fn numbers<const N: usize>(rest: &[&str], usage: &str) -> Result<[f64; N]> {
    if rest.len() != N {
        bail!("usage: {}", usage);
    }

    let mut out = [0.0; N];
    for (slot, word) in out.iter_mut().zip(rest) {
        *slot = word
            .parse()
            .map_err(|_| anyhow!("'{}' is not a number (usage: {})", word, usage))?;
    }
    Ok(out)
}

/// Whole numbers go out as integers so leg and duration arguments validate
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

/// JSON literal when it parses, bare string otherwise
fn literal(word: &str) -> Value {
    serde_json::from_str(word).unwrap_or_else(|_| Value::String(word.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        Command::parse(line).unwrap().unwrap()
    }

    #[test]
    fn test_blank_line() {
        assert!(Command::parse("").unwrap().is_none());
        assert!(Command::parse("   ").unwrap().is_none());
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse("connect"), Command::Connect);
        assert_eq!(parse("  STATUS "), Command::Status);
        assert_eq!(parse("y"), Command::Decide(true));
        assert_eq!(parse("no"), Command::Decide(false));
        assert_eq!(parse("select two"), Command::Select("two".to_string()));
        assert_eq!(parse("log"), Command::Log(None));
        assert_eq!(parse("log pack1"), Command::Log(Some("pack1".to_string())));
        assert_eq!(parse("archive"), Command::Archive(20));
        assert_eq!(parse("archive 5"), Command::Archive(5));
        assert_eq!(parse("quit"), Command::Quit);
    }

    #[test]
    fn test_call_arguments() {
        assert_eq!(
            parse("call pushup"),
            Command::Call {
                operation: Operation::Pushup,
                args: vec![],
            }
        );
        assert_eq!(
            parse("call start_watch"),
            Command::Call {
                operation: Operation::Watch,
                args: vec![],
            }
        );
        assert_eq!(
            parse("call set_vector 0.5 -0.08"),
            Command::Call {
                operation: Operation::SetVector,
                args: vec![json!(0.5), json!(-0.08)],
            }
        );
        assert!(Command::parse("call fly").is_err());
        assert!(Command::parse("call").is_err());
    }

    #[test]
    fn test_motion_commands() {
        assert_eq!(parse("vector 0.5 0"), Command::Vector(0.5, 0.0));
        assert_eq!(parse("head -3 1.5"), Command::Head(-3.0, 1.5));
        assert!(Command::parse("vector 0.5").is_err());
        assert!(Command::parse("head up down").is_err());
    }

    #[test]
    fn test_leg_commands() {
        assert_eq!(
            parse("lift 2 0.3 500"),
            Command::Call {
                operation: Operation::LiftLeg,
                args: vec![json!(2), json!(0.3), json!(500)],
            }
        );
        assert_eq!(
            parse("point 1 0.1 0 -0.2 750"),
            Command::Call {
                operation: Operation::TargetPoint,
                args: vec![json!(1), json!([0.1, 0.0, -0.2]), json!(750)],
            }
        );
        assert!(Command::parse("point 1 0.1 0 750").is_err());
    }

    #[test]
    fn test_clear_command() {
        assert_eq!(
            parse("clear pack1"),
            Command::Clear {
                channel: "pack1".to_string(),
                archived: false,
            }
        );
        assert_eq!(
            parse("clear system ALL"),
            Command::Clear {
                channel: "system".to_string(),
                archived: true,
            }
        );
        assert!(Command::parse("clear").is_err());
        assert!(Command::parse("clear pack1 some").is_err());
    }

    #[test]
    fn test_say_keeps_phrase() {
        assert_eq!(
            parse("say pack one stop watching"),
            Command::Say("pack one stop watching".to_string())
        );
        assert!(Command::parse("say").is_err());
    }

    #[test]
    fn test_unknown_command() {
        let err = Command::parse("jump").unwrap_err();
        assert!(err.to_string().contains("jump"));
    }
}
