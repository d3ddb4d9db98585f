//! Line grammar for the emulator console.

use core::fmt;
use std::time::Duration;

use accessory_core::stack::{AttributeValue, EndpointId};
use winnow::ascii::{Caseless, dec_uint, space0, space1};
use winnow::combinator::{alt, cut_err, delimited, eof, opt, preceded};
use winnow::prelude::*;

/// Console commands understood by the emulator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Commission,
    Connect,
    Disconnect,
    Press,
    Release,
    Hold(Duration),
    Wait(Duration),
    Set {
        endpoint: EndpointId,
        value: AttributeValue,
    },
    Identify {
        endpoint: EndpointId,
        effect: u8,
    },
    RemoveFabric,
    Status,
    Log,
    Help,
}

/// Syntax error with the byte offset where parsing stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandError {
    pub offset: usize,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unexpected input at column {}", self.offset + 1)
    }
}

/// Parses one console line.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    delimited(space0, command, (space0, eof))
        .parse(line)
        .map_err(|error| CommandError {
            offset: error.offset(),
        })
}

fn command(input: &mut &str) -> ModalResult<Command> {
    alt((
        Caseless("commission").value(Command::Commission),
        Caseless("connect").value(Command::Connect),
        Caseless("disconnect").value(Command::Disconnect),
        Caseless("press").value(Command::Press),
        Caseless("release").value(Command::Release),
        preceded((Caseless("hold"), space1), cut_err(duration)).map(Command::Hold),
        preceded((Caseless("wait"), space1), cut_err(duration)).map(Command::Wait),
        preceded((Caseless("set"), space1), cut_err(set_args)),
        preceded(Caseless("identify"), cut_err(identify_args)),
        Caseless("remove-fabric").value(Command::RemoveFabric),
        Caseless("status").value(Command::Status),
        Caseless("log").value(Command::Log),
        Caseless("help").value(Command::Help),
    ))
    .parse_next(input)
}

fn set_args(input: &mut &str) -> ModalResult<Command> {
    let endpoint = endpoint.parse_next(input)?;
    space1.parse_next(input)?;
    let value = alt((
        Caseless("on").value(AttributeValue::Bool(true)),
        Caseless("off").value(AttributeValue::Bool(false)),
        byte.map(AttributeValue::U8),
    ))
    .parse_next(input)?;
    Ok(Command::Set { endpoint, value })
}

fn identify_args(input: &mut &str) -> ModalResult<Command> {
    let endpoint = opt(preceded(space1, endpoint)).parse_next(input)?;
    let effect = opt(preceded(space1, byte)).parse_next(input)?;
    Ok(Command::Identify {
        endpoint: endpoint.unwrap_or(1),
        effect: effect.unwrap_or(0),
    })
}

/// `250`, `250ms` and `3s` are accepted; bare numbers are milliseconds.
fn duration(input: &mut &str) -> ModalResult<Duration> {
    let value = count.parse_next(input)?;
    let unit = opt(alt((Caseless("ms"), Caseless("s")))).parse_next(input)?;
    Ok(match unit {
        Some(unit) if unit.eq_ignore_ascii_case("s") => Duration::from_secs(value),
        _ => Duration::from_millis(value),
    })
}

fn endpoint(input: &mut &str) -> ModalResult<EndpointId> {
    dec_uint(input)
}

fn byte(input: &mut &str) -> ModalResult<u8> {
    dec_uint(input)
}

fn count(input: &mut &str) -> ModalResult<u64> {
    dec_uint(input)
}
