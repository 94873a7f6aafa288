use super::ValidationError;

/// One constraint from a rule expression such as `required|numeric|exists:rubrics,id`.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Required,
    /// Skip the field entirely when it was not submitted.
    Sometimes,
    Nullable,
    Numeric,
    Integer,
    String,
    Image,
    Exists { table: String, column: Option<String> },
    Unique { table: String, column: Option<String> },
    Mimes(Vec<String>),
    Max(f64),
    Min(f64),
}

impl Rule {
    /// Parse a `|`-separated rule expression.
    pub fn parse_list(expression: &str) -> Result<Vec<Rule>, ValidationError> {
        expression
            .split('|')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Rule::parse)
            .collect()
    }

    pub fn parse(part: &str) -> Result<Rule, ValidationError> {
        let (name, params) = match part.split_once(':') {
            Some((name, params)) => (name, params.split(',').map(str::trim).collect()),
            None => (part, Vec::new()),
        };

        let rule = match name {
            "required" => Rule::Required,
            "sometimes" => Rule::Sometimes,
            "nullable" => Rule::Nullable,
            "numeric" => Rule::Numeric,
            "integer" => Rule::Integer,
            "string" => Rule::String,
            "image" => Rule::Image,
            "exists" => {
                let (table, column) = table_and_column(part, &params)?;
                Rule::Exists { table, column }
            }
            "unique" => {
                let (table, column) = table_and_column(part, &params)?;
                Rule::Unique { table, column }
            }
            "mimes" => {
                if params.iter().all(|p| p.is_empty()) {
                    return Err(ValidationError::Rule(format!(
                        "'{part}' needs at least one extension"
                    )));
                }
                Rule::Mimes(
                    params
                        .iter()
                        .filter(|p| !p.is_empty())
                        .map(|p| p.to_lowercase())
                        .collect(),
                )
            }
            "max" => Rule::Max(number_param(part, &params)?),
            "min" => Rule::Min(number_param(part, &params)?),
            _ => return Err(ValidationError::Rule(format!("unknown rule '{name}'"))),
        };

        Ok(rule)
    }

    /// Rule name as used in `field.rule` message keys.
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::Sometimes => "sometimes",
            Rule::Nullable => "nullable",
            Rule::Numeric => "numeric",
            Rule::Integer => "integer",
            Rule::String => "string",
            Rule::Image => "image",
            Rule::Exists { .. } => "exists",
            Rule::Unique { .. } => "unique",
            Rule::Mimes(_) => "mimes",
            Rule::Max(_) => "max",
            Rule::Min(_) => "min",
        }
    }

    /// Rules that only steer evaluation and never fail on their own.
    pub fn is_modifier(&self) -> bool {
        matches!(self, Rule::Required | Rule::Sometimes | Rule::Nullable)
    }
}

fn table_and_column(part: &str, params: &[&str]) -> Result<(String, Option<String>), ValidationError> {
    match params {
        [table] if !table.is_empty() => Ok((table.to_string(), None)),
        [table, column] if !table.is_empty() && !column.is_empty() => {
            Ok((table.to_string(), Some(column.to_string())))
        }
        _ => Err(ValidationError::Rule(format!(
            "'{part}' expects table[,column]"
        ))),
    }
}

fn number_param(part: &str, params: &[&str]) -> Result<f64, ValidationError> {
    match params {
        [value] => value
            .parse()
            .map_err(|_| ValidationError::Rule(format!("'{part}' expects a number"))),
        _ => Err(ValidationError::Rule(format!(
            "'{part}' expects exactly one parameter"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let rules = Rule::parse_list("required|numeric|exists:rubrics,id").unwrap();
        assert_eq!(
            rules,
            vec![
                Rule::Required,
                Rule::Numeric,
                Rule::Exists {
                    table: "rubrics".to_string(),
                    column: Some("id".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_parse_file_rules() {
        let rules = Rule::parse_list("sometimes|image|mimes:JPG, png|max:400").unwrap();
        assert_eq!(
            rules,
            vec![
                Rule::Sometimes,
                Rule::Image,
                Rule::Mimes(vec!["jpg".to_string(), "png".to_string()]),
                Rule::Max(400.0),
            ]
        );
    }

    #[test]
    fn test_unique_without_column() {
        assert_eq!(
            Rule::parse("unique:paintings").unwrap(),
            Rule::Unique {
                table: "paintings".to_string(),
                column: None,
            }
        );
    }

    #[test]
    fn test_invalid_rules() {
        assert!(matches!(Rule::parse("shiny"), Err(ValidationError::Rule(_))));
        assert!(matches!(Rule::parse("max:lots"), Err(ValidationError::Rule(_))));
        assert!(matches!(Rule::parse("exists"), Err(ValidationError::Rule(_))));
        assert!(matches!(Rule::parse("mimes:"), Err(ValidationError::Rule(_))));
    }
}
