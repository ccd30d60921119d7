use crate::controller::UiAction;

pub const HELP: &str = "commands: session | interval | clear | start | quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    Press(UiAction),
    Help,
    Quit,
}

/// Maps a typed line to a button press. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Option<HostCommand> {
    let word = line.trim().to_ascii_lowercase();
    let command = match word.as_str() {
        "" => return None,
        "session" | "w" | "workout" => HostCommand::Press(UiAction::ToggleSession),
        "interval" | "i" => HostCommand::Press(UiAction::CycleDuration),
        "clear" | "c" => HostCommand::Press(UiAction::ClearTimer),
        "start" | "stop" | "s" => HostCommand::Press(UiAction::ToggleTimer),
        "quit" | "q" | "exit" => HostCommand::Quit,
        _ => HostCommand::Help,
    };
    Some(command)
}
