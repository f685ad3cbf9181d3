use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{map_res, opt},
    sequence::{delimited, preceded},
    IResult,
};

use crate::epoch::parse_epoch;

/// Commands understood by the interactive client.
#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    Epochs { limit: Option<usize>, offset: Option<usize> },
    Get { epoch: String },
    Speed { epoch: String },
    Location { epoch: String },
    Now,
    Summary,
    Help,
    Exit,
}

// --- BASIC PARSERS ---

fn parse_usize(input: &str) -> IResult<&str, usize> {
    map_res(digit1, |s: &str| s.parse::<usize>())(input)
}

fn is_epoch_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == ':' || c == '.'
}

/// A day-of-year epoch, optionally single-quoted.
fn parse_epoch_token(input: &str) -> IResult<&str, String> {
    let mut bare = map_res(take_while1(is_epoch_char), |s: &str| {
        parse_epoch(s).map(|_| s.to_string())
    });
    let (input, _) = opt(char('\''))(input)?;
    let (input, epoch) = bare(input)?;
    let (input, _) = opt(char('\''))(input)?;
    Ok((input, epoch))
}

// --- HELPERS ---
fn ws<'a, F, O, E: nom::error::ParseError<&'a str>>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where
    F: FnMut(&'a str) -> IResult<&'a str, O, E>,
{
    delimited(multispace0, inner, multispace0)
}

fn tag_ci(t: &'static str) -> impl FnMut(&str) -> IResult<&str, &str> {
    move |input| tag_no_case(t)(input)
}

// --- COMMAND PARSERS ---

fn parse_epochs(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("EPOCHS")(input)?;
    let (input, limit) = opt(preceded(ws(tag_ci("LIMIT")), parse_usize))(input)?;
    let (input, offset) = opt(preceded(ws(tag_ci("OFFSET")), parse_usize))(input)?;
    Ok((input, Command::Epochs { limit, offset }))
}

fn epoch_command<'a>(
    keyword: &'static str,
    build: fn(String) -> Command,
) -> impl FnMut(&'a str) -> IResult<&'a str, Command> {
    move |input: &'a str| {
        let (input, _) = tag_ci(keyword)(input)?;
        let (input, _) = multispace1(input)?;
        let (input, epoch) = parse_epoch_token(input)?;
        Ok((input, build(epoch)))
    }
}

fn parse_get(input: &str) -> IResult<&str, Command> {
    alt((
        epoch_command("GET", |epoch| Command::Get { epoch }),
        epoch_command("STATE", |epoch| Command::Get { epoch }),
    ))(input)
}

fn parse_speed(input: &str) -> IResult<&str, Command> {
    epoch_command("SPEED", |epoch| Command::Speed { epoch })(input)
}

fn parse_location(input: &str) -> IResult<&str, Command> {
    alt((
        epoch_command("LOCATION", |epoch| Command::Location { epoch }),
        epoch_command("WHERE", |epoch| Command::Location { epoch }),
    ))(input)
}

fn parse_now(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("NOW")(input)?;
    Ok((input, Command::Now))
}

fn parse_summary(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("SUMMARY")(input)?;
    Ok((input, Command::Summary))
}

fn parse_help(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("HELP")(input)?;
    Ok((input, Command::Help))
}

fn parse_exit(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("EXIT"), tag_ci("QUIT")))(input)?;
    Ok((input, Command::Exit))
}

pub fn parse_command(input: &str) -> Result<Command, String> {
    let input = input.trim();
    let result = alt((
        parse_epochs,
        parse_get,
        parse_speed,
        parse_location,
        parse_now,
        parse_summary,
        parse_help,
        parse_exit,
    ))(input);

    match result {
        Ok((remainder, cmd)) => {
            if !remainder.trim().is_empty() {
                return Err(format!("Unexpected tokens at end: '{}'", remainder));
            }
            Ok(cmd)
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let context = if e.input.chars().count() > 20 {
                format!("{}...", e.input.chars().take(20).collect::<String>())
            } else {
                e.input.to_string()
            };
            Err(format!("Invalid syntax near: '{}'", context))
        }
        Err(nom::Err::Incomplete(_)) => Err("Incomplete command.".to_string()),
    }
}
