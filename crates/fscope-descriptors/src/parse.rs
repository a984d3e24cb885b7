//! Parser for descriptor files.
//!
//! The file is line-oriented: `#` starts a comment, `struct NAME {` opens a
//! structure, one field declaration per line, `}` closes it. Field
//! declarations themselves are parsed with nom.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char as pchar, digit1, multispace0, multispace1},
    combinator::{all_consuming, opt},
    sequence::{delimited, preceded},
    IResult,
};
use thiserror::Error;

use crate::model::{FieldDescriptor, FieldKind, StructDescriptor};

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("descriptor parse error on line {line}: {message}")]
    Line { line: usize, message: String },
}

/// Parse a whole descriptor file into structure descriptors, in declaration
/// order. Field offsets are assigned as the running sum of field sizes.
pub fn parse_descriptors(text: &str) -> Result<Vec<StructDescriptor>, DescriptorError> {
    let mut structs: Vec<StructDescriptor> = Vec::new();
    let mut open: Option<(StructDescriptor, usize)> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("struct ").map(str::trim) {
            if open.is_some() {
                return Err(DescriptorError::Line {
                    line: line_no,
                    message: "nested struct declaration".to_string(),
                });
            }
            let name = parse_struct_header(rest).map_err(|message| DescriptorError::Line {
                line: line_no,
                message,
            })?;
            open = Some((
                StructDescriptor {
                    name,
                    fields: Vec::new(),
                },
                0,
            ));
            continue;
        }

        if line == "}" {
            match open.take() {
                Some((desc, _)) => structs.push(desc),
                None => {
                    return Err(DescriptorError::Line {
                        line: line_no,
                        message: "unmatched `}`".to_string(),
                    })
                }
            }
            continue;
        }

        let Some((desc, next_offset)) = open.as_mut() else {
            return Err(DescriptorError::Line {
                line: line_no,
                message: format!("expected `struct` declaration, found `{line}`"),
            });
        };

        let (kind, name, count) =
            parse_field_decl(line).map_err(|message| DescriptorError::Line {
                line: line_no,
                message,
            })?;
        let field = FieldDescriptor {
            name,
            kind,
            count,
            offset: *next_offset,
        };
        *next_offset += field.size();
        desc.fields.push(field);
    }

    if open.is_some() {
        return Err(DescriptorError::Line {
            line: text.lines().count(),
            message: "unterminated struct declaration".to_string(),
        });
    }

    Ok(structs)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(i) => &line[..i],
        None => line,
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn parse_ident(input: &str) -> IResult<&str, &str> {
    take_while1(is_ident_char)(input)
}

fn parse_struct_header(rest: &str) -> Result<String, String> {
    fn parser(input: &str) -> IResult<&str, &str> {
        let (input, name) = preceded(multispace0, parse_ident)(input)?;
        let (input, _) = preceded(multispace0, pchar('{'))(input)?;
        let (input, _) = multispace0(input)?;
        Ok((input, name))
    }
    match all_consuming(parser)(rest) {
        Ok((_, name)) => Ok(name.to_string()),
        Err(_) => Err(format!("malformed struct header `struct {rest}`")),
    }
}

/// `TYPE NAME;` or `TYPE NAME[N];`
fn parse_field_decl(line: &str) -> Result<(FieldKind, String, usize), String> {
    fn kind(input: &str) -> IResult<&str, &str> {
        alt((
            tag("uchar"),
            tag("char"),
            tag("ushort"),
            tag("short"),
            tag("ulong"),
            tag("long"),
        ))(input)
    }

    fn parser(input: &str) -> IResult<&str, (&str, &str, Option<&str>)> {
        let (input, ty) = preceded(multispace0, kind)(input)?;
        let (input, name) = preceded(multispace1, parse_ident)(input)?;
        let (input, count) = opt(delimited(pchar('['), digit1, pchar(']')))(input)?;
        let (input, _) = preceded(multispace0, pchar(';'))(input)?;
        let (input, _) = multispace0(input)?;
        Ok((input, (ty, name, count)))
    }

    let (ty, name, count) = match all_consuming(parser)(line) {
        Ok((_, parts)) => parts,
        Err(_) => return Err(format!("malformed field declaration `{line}`")),
    };

    let kind = FieldKind::from_keyword(ty)
        .ok_or_else(|| format!("unknown field type `{ty}`"))?;
    let count = match count {
        Some(digits) => {
            let n: usize = digits
                .parse()
                .map_err(|_| format!("bad array length `{digits}`"))?;
            if n == 0 {
                return Err("zero-length array".to_string());
            }
            n
        }
        None => 1,
    };

    Ok((kind, name.to_string(), count))
}
