use axum::extract::Multipart;
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Multipart body split into its text fields and the uploaded `file` bytes.
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file_name: Option<String>,
    pub file: Vec<u8>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut fields = HashMap::new();
        let mut file_name = None;
        let mut file = None;

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            if name == "file" {
                file_name = field.file_name().map(str::to_string);
                file = Some(field.bytes().await?.to_vec());
            } else if !name.is_empty() {
                let value = field.text().await?;
                fields.insert(name, value.trim().to_string());
            }
        }

        let file = file
            .filter(|f| !f.is_empty())
            .ok_or_else(|| Error::BadRequest("A non-empty file field is required".into()))?;
        if let Some(name) = &file_name {
            let lower = name.to_ascii_lowercase();
            if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
                return Err(Error::BadRequest(
                    "Spreadsheet uploads must be saved as CSV".into(),
                ));
            }
        }

        Ok(Self {
            fields,
            file_name,
            file,
        })
    }

    pub fn field(&self, name: &str) -> Result<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::BadRequest(format!("{} is required", name)))
    }
}
