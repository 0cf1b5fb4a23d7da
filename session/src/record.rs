use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use latex_common::Result;
use latex_common::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compiler {
    Xelatex,
    Pdflatex,
    Lualatex,
}

impl Compiler {
    /// The literal binary name invoked by the Renderer.
    pub fn binary_name(self) -> &'static str {
        match self {
            Compiler::Xelatex => "xelatex",
            Compiler::Pdflatex => "pdflatex",
            Compiler::Lualatex => "lualatex",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "xelatex" => Ok(Compiler::Xelatex),
            "pdflatex" => Ok(Compiler::Pdflatex),
            "lualatex" => Ok(Compiler::Lualatex),
            other => Err(ServiceError::InvalidRequest(format!(
                "compiler '{other}' not supported"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvertFormat {
    Jpeg,
    Png,
    Tiff,
}

impl ConvertFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ConvertFormat::Jpeg => "jpeg",
            ConvertFormat::Png => "png",
            ConvertFormat::Tiff => "tiff",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertSpec {
    pub format: ConvertFormat,
    pub dpi: u32,
}

/// Validates a raw rasterization request. `None` in is a valid "no conversion"
/// request and passes through as `None`; anything else must be a `{format,
/// dpi}` object with `format` one of the three supported values and `dpi` an
/// integer in `[10, 10000]`.
pub fn validate_conversion_data(raw: Option<&Value>) -> Result<Option<ConvertSpec>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }

    let obj = raw.as_object().ok_or_else(|| {
        ServiceError::InvalidRequest(
            "image conversion data must be a dictionary with the keys 'format' and 'dpi'".into(),
        )
    })?;

    let format_raw = obj.get("format").and_then(Value::as_str).ok_or_else(|| {
        ServiceError::InvalidRequest(
            "image conversion data must be a dictionary with the keys 'format' and 'dpi'".into(),
        )
    })?;
    let format = match format_raw {
        "jpeg" => ConvertFormat::Jpeg,
        "png" => ConvertFormat::Png,
        "tiff" => ConvertFormat::Tiff,
        _ => {
            return Err(ServiceError::InvalidRequest(
                "conversion format must be 'jpeg', 'png', or 'tiff'".into(),
            ));
        }
    };

    let dpi_value = obj
        .get("dpi")
        .ok_or_else(|| ServiceError::InvalidRequest("image conversion dpi is required".into()))?;
    let dpi = dpi_value.as_i64().ok_or_else(|| {
        ServiceError::InvalidRequest(
            "image conversion dpi must be an integer between 10 and 10000".into(),
        )
    })?;
    if !(10..=10000).contains(&dpi) {
        return Err(ServiceError::InvalidRequest(
            "image conversion dpi must be an integer between 10 and 10000".into(),
        ));
    }

    Ok(Some(ConvertSpec {
        format,
        dpi: dpi as u32,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Editable,
    Finalized,
    Success,
    Error,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Editable => "editable",
            Status::Finalized => "finalized",
            Status::Success => "success",
            Status::Error => "error",
        }
    }
}

/// The persisted, MetaStore-serializable form of a session. This is what
/// travels through `session:<key>` — everything a `Session` needs to
/// rehydrate except its `SandboxFs` handles, which are reconstructed from
/// `key` by the owning `SessionManager`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub key: String,
    pub compiler: Compiler,
    pub target: String,
    pub created: f64,
    pub expires_at: f64,
    pub status: Status,
    pub convert: Option<ConvertSpec>,
    pub product: Option<String>,
    pub log: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_conversion_data_is_none() {
        assert_eq!(validate_conversion_data(None).expect("valid"), None);
    }

    #[test]
    fn valid_conversion_data_round_trips() {
        let raw = json!({"format": "png", "dpi": 600});
        let parsed = validate_conversion_data(Some(&raw)).expect("valid");
        assert_eq!(
            parsed,
            Some(ConvertSpec {
                format: ConvertFormat::Png,
                dpi: 600
            })
        );
    }

    #[test]
    fn rejects_unsupported_format() {
        let raw = json!({"format": "bmp", "dpi": 300});
        assert!(validate_conversion_data(Some(&raw)).is_err());
    }

    #[test]
    fn rejects_out_of_range_dpi() {
        let raw = json!({"format": "jpeg", "dpi": 5});
        assert!(validate_conversion_data(Some(&raw)).is_err());
        let raw = json!({"format": "jpeg", "dpi": 20000});
        assert!(validate_conversion_data(Some(&raw)).is_err());
    }

    #[test]
    fn rejects_non_integer_dpi() {
        let raw = json!({"format": "jpeg", "dpi": 300.5});
        assert!(validate_conversion_data(Some(&raw)).is_err());
    }
}
