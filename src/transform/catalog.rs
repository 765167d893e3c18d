/// Filters the editor offers, and the fixed parameters each one runs with
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TransformError;

/// One entry of the filter catalog
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Filter {
    /// Fit inside `width` x `height`, keeping the aspect ratio
    Resize { width: u32, height: u32 },
    Grayscale,
    /// Gaussian blur with the given sigma
    Blur { sigma: f32 },
}

impl Filter {
    pub fn name(&self) -> &'static str {
        match self {
            Filter::Resize { .. } => "resize",
            Filter::Grayscale => "grayscale",
            Filter::Blur { .. } => "blur",
        }
    }

    /// Button label: the name with its first letter capitalized
    pub fn label(&self) -> String {
        let name = self.name();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Build a filter from its name and positional numeric arguments,
    /// e.g. `("resize", [200, 200])` or `("blur", [5.0])`.
    pub fn from_name(name: &str, args: &[f64]) -> Result<Self, TransformError> {
        let filter = match (name, args) {
            ("resize", [width, height]) => Filter::Resize {
                width: dimension(name, *width)?,
                height: dimension(name, *height)?,
            },
            ("grayscale", []) => Filter::Grayscale,
            ("blur", [sigma]) => Filter::Blur { sigma: *sigma as f32 },
            ("resize" | "grayscale" | "blur", _) => {
                return Err(TransformError::InvalidArgs {
                    filter: name.to_string(),
                    reason: format!("unexpected argument count {}", args.len()),
                })
            }
            _ => return Err(TransformError::UnknownFilter(name.to_string())),
        };
        filter.validate()?;
        Ok(filter)
    }

    /// Reject parameters the engine cannot run with
    pub fn validate(&self) -> Result<(), TransformError> {
        let reason = match *self {
            Filter::Resize { width, height } if width == 0 || height == 0 => {
                "dimensions must be positive"
            }
            Filter::Blur { sigma } if !sigma.is_finite() || sigma < 0.0 => {
                "sigma must be a non-negative number"
            }
            _ => return Ok(()),
        };
        Err(TransformError::InvalidArgs {
            filter: self.name().to_string(),
            reason: reason.to_string(),
        })
    }
}

fn dimension(filter: &str, value: f64) -> Result<u32, TransformError> {
    if value.fract() != 0.0 || value < 1.0 || value > u32::MAX as f64 {
        return Err(TransformError::InvalidArgs {
            filter: filter.to_string(),
            reason: format!("{} is not a valid dimension", value),
        });
    }
    Ok(value as u32)
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Resize { width, height } => write!(f, "resize({}, {})", width, height),
            Filter::Grayscale => write!(f, "grayscale()"),
            Filter::Blur { sigma } => write!(f, "blur({:.1})", sigma),
        }
    }
}

/// The built-in catalog, in display order
pub fn default_catalog() -> Vec<Filter> {
    vec![
        Filter::Resize { width: 200, height: 200 },
        Filter::Grayscale,
        Filter::Blur { sigma: 5.0 },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_order() {
        let names: Vec<&str> = default_catalog().iter().map(Filter::name).collect();
        assert_eq!(names, vec!["resize", "grayscale", "blur"]);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(
            Filter::from_name("resize", &[200.0, 100.0]).unwrap(),
            Filter::Resize { width: 200, height: 100 }
        );
        assert_eq!(Filter::from_name("grayscale", &[]).unwrap(), Filter::Grayscale);
        assert_eq!(
            Filter::from_name("blur", &[5.0]).unwrap(),
            Filter::Blur { sigma: 5.0 }
        );
    }

    #[test]
    fn test_from_name_rejects_bad_input() {
        assert!(matches!(
            Filter::from_name("sepia", &[]),
            Err(TransformError::UnknownFilter(_))
        ));
        assert!(matches!(
            Filter::from_name("resize", &[200.0]),
            Err(TransformError::InvalidArgs { .. })
        ));
        assert!(matches!(
            Filter::from_name("resize", &[0.0, 10.0]),
            Err(TransformError::InvalidArgs { .. })
        ));
        assert!(matches!(
            Filter::from_name("blur", &[-1.0]),
            Err(TransformError::InvalidArgs { .. })
        ));
    }

    #[test]
    fn test_label() {
        assert_eq!(Filter::Grayscale.label(), "Grayscale");
        assert_eq!(Filter::Blur { sigma: 1.0 }.to_string(), "blur(1.0)");
    }

    #[test]
    fn test_catalog_entries_from_toml() {
        #[derive(Deserialize)]
        struct Catalog {
            filters: Vec<Filter>,
        }
        let parsed: Catalog = toml::from_str(
            r#"
            [[filters]]
            name = "resize"
            width = 64
            height = 32

            [[filters]]
            name = "grayscale"
            "#,
        )
        .unwrap();
        assert_eq!(
            parsed.filters,
            vec![Filter::Resize { width: 64, height: 32 }, Filter::Grayscale]
        );
    }
}
