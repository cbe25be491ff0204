//! Line-oriented command grammar for the control surface

use anyhow::{Context, Result, anyhow, bail};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Edit the minutes field
    Minutes(String),
    /// Edit the seconds field
    Seconds(String),
    /// Save the duration without starting; fields optionally replaced first
    Save(Option<(String, String)>),
    /// Save and start; fields optionally replaced first
    Start(Option<(String, String)>),
    Pause,
    Reset,
    Dark(bool),
    ToggleTheme,
    ColorNormal(String),
    ColorOvertime(String),
    FontLarger,
    FontSmaller,
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  min <N>                       set the minutes field
  sec <N>                       set the seconds field
  save [<M> <S>]                save the duration without starting
  start [<M> <S>]               save the duration and start the timer
  pause                         pause or continue the active timer
  reset                         stop the timer and restore 01:00
  dark on|off                   set dark mode
  theme                         toggle dark mode
  color normal|overtime <hex>   set a timer color
  font +|-                      grow or shrink the display font
  show                          print the current state
  help                          print this help
  quit                          leave the control surface";

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            bail!("Empty command");
        };
        let args: Vec<&str> = words.collect();

        let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("min" | "minutes", [value]) => Command::Minutes(value.to_string()),
            ("sec" | "seconds", [value]) => Command::Seconds(value.to_string()),
            ("save", rest) => Command::Save(duration_args(verb, rest)?),
            ("start", rest) => Command::Start(duration_args(verb, rest)?),
            ("pause" | "continue", []) => Command::Pause,
            ("reset", []) => Command::Reset,
            ("dark", [flag]) => Command::Dark(parse_switch(flag)?),
            ("theme", []) => Command::ToggleTheme,
            ("color", [which, hex]) => match which.to_ascii_lowercase().as_str() {
                "normal" => Command::ColorNormal(hex.to_string()),
                "overtime" => Command::ColorOvertime(hex.to_string()),
                other => bail!("Unknown color '{other}', expected normal or overtime"),
            },
            ("font", ["+"]) => Command::FontLarger,
            ("font", ["-"]) => Command::FontSmaller,
            ("show" | "status", []) => Command::Show,
            ("help" | "?", []) => Command::Help,
            ("quit" | "exit", []) => Command::Quit,
            (other, _) => {
                return Err(anyhow!("Unrecognised command '{other}'"))
                    .context("Type 'help' for the list of commands");
            }
        };
        Ok(command)
    }
}

fn duration_args(verb: &str, args: &[&str]) -> Result<Option<(String, String)>> {
    match args {
        [] => Ok(None),
        [minutes, seconds] => Ok(Some((minutes.to_string(), seconds.to_string()))),
        _ => bail!("'{verb}' takes either no arguments or <minutes> <seconds>"),
    }
}

fn parse_switch(flag: &str) -> Result<bool> {
    match flag.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => bail!("Expected on or off, got '{other}'"),
    }
}
