//! Console input: turns typed lines into notifications

use crate::notification::ClientNotification;
use log::debug;
use shared::TileCoord;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleAction {
    Notify(ClientNotification),
    Quit,
    Help,
}

pub const HELP_TEXT: &str =
    "Commands: /pickup <creature>, /drop <x> <y>, /mark <x> <y> [off], /quit";

/// Parses one console line typed by `nick`.
///
/// Lines that look like a command but have bad arguments become an invalid
/// notification so the dispatcher reports them. Anything else is ignored.
pub fn parse_console_line(line: &str, nick: &str) -> Option<ConsoleAction> {
    let mut words = line.split_whitespace();
    let command = words.next()?;
    let args: Vec<&str> = words.collect();

    let action = match command {
        "/quit" | "/exit" => ConsoleAction::Quit,
        "/help" => ConsoleAction::Help,
        "/pickup" => match args.as_slice() {
            [creature] => ConsoleAction::Notify(ClientNotification::CreaturePickUp {
                player: nick.to_string(),
                creature: creature.to_string(),
            }),
            _ => invalid("usage: /pickup <creature>"),
        },
        "/drop" => match parse_coord(&args) {
            Some(tile) if args.len() == 2 => {
                ConsoleAction::Notify(ClientNotification::CreatureDrop {
                    player: nick.to_string(),
                    tile,
                })
            }
            _ => invalid("usage: /drop <x> <y>"),
        },
        "/mark" => match (parse_coord(&args), args.get(2).copied()) {
            (Some(tile), None) => ConsoleAction::Notify(ClientNotification::MarkTile {
                tile,
                marked: true,
            }),
            (Some(tile), Some("off")) => ConsoleAction::Notify(ClientNotification::MarkTile {
                tile,
                marked: false,
            }),
            _ => invalid("usage: /mark <x> <y> [off]"),
        },
        _ => {
            debug!("Ignoring console input: {}", line);
            return None;
        }
    };
    Some(action)
}

fn invalid(reason: &str) -> ConsoleAction {
    ConsoleAction::Notify(ClientNotification::Invalid {
        reason: reason.to_string(),
    })
}

fn parse_coord(args: &[&str]) -> Option<TileCoord> {
    let x = args.first()?.parse().ok()?;
    let y = args.get(1)?.parse().ok()?;
    Some(TileCoord::new(x, y))
}

/// Forwards stdin lines to the frame loop until stdin closes.
pub fn spawn_console_reader() -> mpsc::UnboundedReceiver<String> {
    let (sender, receiver) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pickup_and_drop() {
        assert_eq!(
            parse_console_line("/pickup Imp_2", "Keeper"),
            Some(ConsoleAction::Notify(ClientNotification::CreaturePickUp {
                player: "Keeper".to_string(),
                creature: "Imp_2".to_string(),
            }))
        );
        assert_eq!(
            parse_console_line("  /drop 3 -4 ", "Keeper"),
            Some(ConsoleAction::Notify(ClientNotification::CreatureDrop {
                player: "Keeper".to_string(),
                tile: TileCoord::new(3, -4),
            }))
        );
    }

    #[test]
    fn test_mark_toggle() {
        assert_eq!(
            parse_console_line("/mark 1 2", "Keeper"),
            Some(ConsoleAction::Notify(ClientNotification::MarkTile {
                tile: TileCoord::new(1, 2),
                marked: true,
            }))
        );
        assert_eq!(
            parse_console_line("/mark 1 2 off", "Keeper"),
            Some(ConsoleAction::Notify(ClientNotification::MarkTile {
                tile: TileCoord::new(1, 2),
                marked: false,
            }))
        );
    }

    #[test]
    fn test_bad_arguments_become_invalid() {
        for line in ["/drop 3", "/drop x y", "/pickup", "/mark 1 2 maybe"] {
            assert!(matches!(
                parse_console_line(line, "Keeper"),
                Some(ConsoleAction::Notify(ClientNotification::Invalid { .. }))
            ));
        }
    }

    #[test]
    fn test_other_lines() {
        assert_eq!(parse_console_line("/quit", "Keeper"), Some(ConsoleAction::Quit));
        assert_eq!(parse_console_line("/help", "Keeper"), Some(ConsoleAction::Help));
        assert_eq!(parse_console_line("hello there", "Keeper"), None);
        assert_eq!(parse_console_line("   ", "Keeper"), None);
    }
}
