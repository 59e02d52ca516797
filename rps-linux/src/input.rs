//! stdin as the keypad: one command per line.

use anyhow::{anyhow, bail, Context};
use rps_core::{Event, GameNumber, Hand, Input, LocalMove};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub const HELP: &str = "\
commands:
  host [game] [freq]   advertise a game (default game and frequency from config)
  browse [freq]        look for games
  next | prev          move through games found, or through stats
  select               join the selected game
  count                count one, then two
  rock | paper | scissors
  again                play again after a result
  quit                 leave the game
  back                 cancel, or acknowledge a timeout
  stats                show past opponents
  exit";

/// Values used when a command leaves them out.
#[derive(Debug, Clone, Copy)]
pub struct Defaults {
    pub game_number: GameNumber,
    pub frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Game(Input),
    Help,
    Exit,
}

pub fn parse_line(line: &str, defaults: &Defaults) -> anyhow::Result<Command> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        bail!("empty command");
    };
    let args: Vec<&str> = words.collect();
    let input = match cmd.to_ascii_lowercase().as_str() {
        "host" | "h" => Input::Host {
            game_number: match args.first() {
                Some(s) => parse_game_number(s)?,
                None => defaults.game_number,
            },
            frequency: match args.get(1) {
                Some(s) => parse_frequency(s)?,
                None => defaults.frequency,
            },
        },
        "browse" | "join" | "j" => Input::Browse {
            frequency: match args.first() {
                Some(s) => parse_frequency(s)?,
                None => defaults.frequency,
            },
        },
        "next" | "n" | "down" => Input::Next,
        "prev" | "previous" | "up" => Input::Previous,
        "select" | "s" | "ok" => Input::Select,
        "count" | "c" => Input::Move(LocalMove::Count),
        "rock" | "r" => Input::Move(LocalMove::Throw(Hand::Rock)),
        "paper" | "p" => Input::Move(LocalMove::Throw(Hand::Paper)),
        "scissors" | "x" => Input::Move(LocalMove::Throw(Hand::Scissors)),
        "again" | "a" => Input::PlayAgain,
        "quit" | "q" => Input::Quit,
        "back" | "b" => Input::Back,
        "stats" => Input::Stats,
        "help" | "?" => return Ok(Command::Help),
        "exit" => return Ok(Command::Exit),
        other => bail!("unknown command {:?}", other),
    };
    Ok(Command::Game(input))
}

fn parse_game_number(s: &str) -> anyhow::Result<GameNumber> {
    let n: u16 = s.parse().with_context(|| format!("bad game number {:?}", s))?;
    GameNumber::new(n).ok_or_else(|| anyhow!("game number {} is above {}", n, GameNumber::MAX))
}

fn parse_frequency(s: &str) -> anyhow::Result<u32> {
    s.parse()
        .with_context(|| format!("bad frequency {:?} (Hz)", s))
}

/// Read commands until `exit` or end of input, then ask the consumer to shut down.
pub async fn run(events: mpsc::Sender<Event>, defaults: Defaults) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => break,
            Err(e) => {
                warn!("stdin: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line, &defaults) {
            Ok(Command::Game(input)) => {
                debug!("input {:?}", input);
                if events.send(Event::Input(input)).await.is_err() {
                    return;
                }
            }
            Ok(Command::Help) => println!("{}", HELP),
            Ok(Command::Exit) => break,
            Err(e) => println!("{:#}", e),
        }
    }
    let _ = events.send(Event::Shutdown).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Defaults {
        Defaults {
            game_number: GameNumber::new(42).unwrap(),
            frequency: 433_920_000,
        }
    }

    fn parse(line: &str) -> Command {
        parse_line(line, &defaults()).unwrap()
    }

    #[test]
    fn host_uses_defaults() {
        assert_eq!(
            parse("host"),
            Command::Game(Input::Host {
                game_number: GameNumber::new(42).unwrap(),
                frequency: 433_920_000,
            })
        );
        assert_eq!(
            parse("HOST 7 915000000"),
            Command::Game(Input::Host {
                game_number: GameNumber::new(7).unwrap(),
                frequency: 915_000_000,
            })
        );
    }

    #[test]
    fn moves() {
        assert_eq!(parse("c"), Command::Game(Input::Move(LocalMove::Count)));
        assert_eq!(
            parse("scissors"),
            Command::Game(Input::Move(LocalMove::Throw(Hand::Scissors)))
        );
        assert_eq!(parse("exit"), Command::Exit);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_line("host 1000", &defaults()).is_err());
        assert!(parse_line("browse fast", &defaults()).is_err());
        assert!(parse_line("dance", &defaults()).is_err());
        assert!(parse_line("   ", &defaults()).is_err());
    }
}
