use std::fmt;

/// Reply used whenever an operation produced nothing worth showing.
pub const NO_ENTRIES_SENTINEL: &str = "No entries found.";

#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Text(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Null,
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(value) => f.write_str(value),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Null => f.write_str("not set"),
        }
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl<T> From<Option<T>> for Scalar
where
    T: Into<Scalar>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Ordered field list; rendering follows insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Scalar)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn fields(&self) -> &[(String, Scalar)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.fields.iter().find(|(field, _)| field == name).map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn render(&self) -> String {
        self.fields
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ResultValue {
    Record(Record),
    RecordList(Vec<Record>),
    Status(String),
    Empty,
}

impl ResultValue {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status(message.into())
    }
}

/// Renders a result as plain text for the conversation history.
pub fn format_result(value: &ResultValue) -> String {
    match value {
        ResultValue::Empty => NO_ENTRIES_SENTINEL.to_string(),
        ResultValue::Record(record) if record.is_empty() => NO_ENTRIES_SENTINEL.to_string(),
        ResultValue::Record(record) => record.render(),
        ResultValue::RecordList(records) => {
            let blocks = records
                .iter()
                .filter(|record| !record.is_empty())
                .map(Record::render)
                .collect::<Vec<_>>();
            if blocks.is_empty() {
                NO_ENTRIES_SENTINEL.to_string()
            } else {
                blocks.join("\n\n")
            }
        }
        ResultValue::Status(message) if message.trim().is_empty() => {
            NO_ENTRIES_SENTINEL.to_string()
        }
        ResultValue::Status(message) => message.clone(),
    }
}

/// Cuts `text` to at most `limit` characters and appends a marker naming the original size.
pub fn truncate_result(text: String, limit: Option<usize>) -> String {
    let Some(limit) = limit else {
        return text;
    };
    let total = text.chars().count();
    if total <= limit {
        return text;
    }

    let mut truncated: String = text.chars().take(limit).collect();
    truncated.push_str(&format!("\n[Result truncated: showing {limit} of {total} characters.]"));
    truncated
}

#[cfg(test)]
mod tests {
    use super::{format_result, truncate_result, Record, ResultValue, Scalar, NO_ENTRIES_SENTINEL};

    fn client(name: &str, email: &str) -> Record {
        Record::new().field("name", name).field("description", "Widgets").field("email", email)
    }

    #[test]
    fn empty_shapes_render_the_sentinel() {
        assert_eq!(format_result(&ResultValue::Empty), NO_ENTRIES_SENTINEL);
        assert_eq!(format_result(&ResultValue::RecordList(Vec::new())), NO_ENTRIES_SENTINEL);
        assert_eq!(format_result(&ResultValue::Record(Record::new())), NO_ENTRIES_SENTINEL);
        assert_eq!(format_result(&ResultValue::status("")), NO_ENTRIES_SENTINEL);
    }

    #[test]
    fn record_renders_one_line_per_field_in_order() {
        let rendered = format_result(&ResultValue::Record(client("Acme", "ops@acme.test")));
        assert_eq!(rendered, "name: Acme\ndescription: Widgets\nemail: ops@acme.test");
    }

    #[test]
    fn record_list_separates_blocks_with_a_blank_line() {
        let rendered = format_result(&ResultValue::RecordList(vec![
            client("Acme", "ops@acme.test"),
            client("Globex", "it@globex.test"),
        ]));

        let blocks: Vec<&str> = rendered.split("\n\n").collect();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("name: Acme"));
        assert!(blocks[1].contains("name: Globex"));
    }

    #[test]
    fn status_is_returned_verbatim() {
        let status = ResultValue::status("Client 'Acme' added successfully.");
        assert_eq!(format_result(&status), "Client 'Acme' added successfully.");
    }

    #[test]
    fn scalars_render_plainly() {
        let record = Record::new()
            .field("count", 3_i64)
            .field("ratio", 0.5_f64)
            .field("active", true)
            .field("joined_on", None::<String>);

        assert_eq!(record.get("joined_on"), Some(&Scalar::Null));
        assert_eq!(
            format_result(&ResultValue::Record(record)),
            "count: 3\nratio: 0.5\nactive: true\njoined_on: not set"
        );
    }

    #[test]
    fn truncation_appends_marker_only_when_over_limit() {
        assert_eq!(truncate_result("short".to_string(), Some(10)), "short");
        assert_eq!(truncate_result("unbounded".to_string(), None), "unbounded");

        let truncated = truncate_result("abcdefghij".to_string(), Some(4));
        assert!(truncated.starts_with("abcd\n"));
        assert!(truncated.ends_with("[Result truncated: showing 4 of 10 characters.]"));
    }
}
