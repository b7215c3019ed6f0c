use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Vector '{0}' is empty. Expected comma-separated numbers (e.g., '0.5,1.5').")]
    EmptyVector(String),

    #[error("Component {index} of '{list}' is not a number: '{value}'.")]
    InvalidComponent {
        index: usize,
        value: String,
        list: String,
    },
}

/// Parses a comma-separated list of floats such as `0.5, 1.5,-2`.
pub fn parse_vector(list: &str) -> Result<Vec<f64>, ParseError> {
    if list.trim().is_empty() {
        return Err(ParseError::EmptyVector(list.to_string()));
    }

    list.split(',')
        .map(str::trim)
        .enumerate()
        .map(|(index, value)| {
            value
                .parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .ok_or_else(|| ParseError::InvalidComponent {
                    index,
                    value: value.to_string(),
                    list: list.to_string(),
                })
        })
        .collect()
}
