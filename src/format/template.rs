use std::str::FromStr;

use super::{Error, Result};

/// A display column of the stats table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Container,
    Name,
    ID,
    CPUPerc,
    MemUsage,
    MemPerc,
    NetIO,
    BlockIO,
    PIDs,
}

impl Column {
    pub const ALL: [Column; 9] = [
        Column::Container,
        Column::Name,
        Column::ID,
        Column::CPUPerc,
        Column::MemUsage,
        Column::MemPerc,
        Column::NetIO,
        Column::BlockIO,
        Column::PIDs,
    ];

    /// The field name used in templates, e.g. `CPUPerc` in `{{.CPUPerc}}`.
    pub fn field(self) -> &'static str {
        match self {
            Column::Container => "Container",
            Column::Name => "Name",
            Column::ID => "ID",
            Column::CPUPerc => "CPUPerc",
            Column::MemUsage => "MemUsage",
            Column::MemPerc => "MemPerc",
            Column::NetIO => "NetIO",
            Column::BlockIO => "BlockIO",
            Column::PIDs => "PIDs",
        }
    }
}

impl FromStr for Column {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Column::ALL.into_iter().find(|c| c.field() == s).ok_or(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Segment {
    Text(String),
    Column(Column),
    /// `{{json .}}` when `None`, `{{json .Column}}` otherwise.
    Json(Option<Column>),
}

/// A parsed row template.
///
/// Supports literal text, `{{.Column}}` and `{{json ...}}` actions. Anything else is
/// rejected while parsing so that a bad format never produces partial output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(src: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = src;
        let mut consumed = 0;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Text(rest[..open].to_owned()));
            }
            let line = line_of(src, consumed + open);
            let after = &rest[open + 2..];
            let close = after
                .find("}}")
                .ok_or_else(|| parse_error(line, None, "unclosed action"))?;
            segments.push(parse_action(after[..close].trim(), line)?);

            let used = open + 2 + close + 2;
            consumed += used;
            rest = &rest[used..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_owned()));
        }

        Ok(Self { segments })
    }

    pub(super) fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

fn line_of(src: &str, offset: usize) -> usize {
    src[..offset].matches('\n').count() + 1
}

fn parse_error(line: usize, col: Option<usize>, msg: impl AsRef<str>) -> Error {
    let pos = match col {
        Some(col) => format!("{line}:{col}"),
        None => line.to_string(),
    };
    Error::Parse(format!("template: :{pos}: {}", msg.as_ref()))
}

fn parse_action(action: &str, line: usize) -> Result<Segment> {
    let mut words = action.split_whitespace();
    let Some(head) = words.next() else {
        return Err(parse_error(line, None, "missing value for command"));
    };
    let args: Vec<&str> = words.collect();

    if let Some(field) = head.strip_prefix('.') {
        if !args.is_empty() {
            return Err(parse_error(
                line,
                None,
                format!("can't give argument to non-function {head}"),
            ));
        }
        return field_column(field, line).map(Segment::Column);
    }

    match head {
        "json" => match args.as_slice() {
            ["."] => Ok(Segment::Json(None)),
            [arg] if arg.starts_with('.') => field_column(&arg[1..], line).map(|c| Segment::Json(Some(c))),
            [arg] => Err(parse_error(line, None, format!("function \"{arg}\" not defined"))),
            _ => Err(parse_error(
                line,
                None,
                format!("wrong number of args for json: want 1 got {}", args.len()),
            )),
        },
        "nil" => Err(parse_error(line, Some(2), "executing \"\" at <nil>: nil is not a command")),
        name => Err(parse_error(line, None, format!("function \"{name}\" not defined"))),
    }
}

fn field_column(field: &str, line: usize) -> Result<Column> {
    field.parse().map_err(|()| {
        let field = if field.is_empty() { "." } else { field };
        parse_error(line, None, format!("can't evaluate field {field}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_columns_and_text() {
        let tmpl = Template::parse("{{.Container}}: {{ .CPUPerc }}").unwrap();
        assert_eq!(
            tmpl.segments(),
            &[
                Segment::Column(Column::Container),
                Segment::Text(": ".to_owned()),
                Segment::Column(Column::CPUPerc),
            ]
        );
    }

    #[test]
    fn test_parse_json_actions() {
        let tmpl = Template::parse("{{json .}} {{json .Name}}").unwrap();
        assert_eq!(tmpl.segments()[0], Segment::Json(None));
        assert_eq!(tmpl.segments()[2], Segment::Json(Some(Column::Name)));
    }

    #[test]
    fn test_parse_errors() {
        let err = Template::parse("{{InvalidFunction}}").unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"template parsing error: template: :1: function "InvalidFunction" not defined"#
        );

        let err = Template::parse("{{nil}}").unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"template parsing error: template: :1:2: executing "" at <nil>: nil is not a command"#
        );

        let err = Template::parse("a\n{{.Bogus}}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "template parsing error: template: :2: can't evaluate field Bogus"
        );

        assert!(Template::parse("{{.Name").is_err());
        assert!(Template::parse("{{}}").is_err());
    }

    #[test]
    fn test_plain_text_is_kept() {
        let tmpl = Template::parse("no actions here").unwrap();
        assert_eq!(tmpl.segments(), &[Segment::Text("no actions here".to_owned())]);
    }
}
