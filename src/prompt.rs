use std::fmt;

/// Social network the captions are written for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Platform {
    #[default]
    General,
    Instagram,
    Facebook,
    LinkedIn,
    /// Unrecognized values are passed through to the prompt as given.
    Other(String),
}

impl Platform {
    /// Reads the optional `platform` form field. Absent or blank means general.
    pub fn from_field(value: Option<&str>) -> Self {
        let value = match value.map(str::trim) {
            Some(v) if !v.is_empty() => v,
            _ => return Platform::General,
        };
        match value.to_ascii_lowercase().as_str() {
            "general" => Platform::General,
            "instagram" => Platform::Instagram,
            "facebook" => Platform::Facebook,
            "linkedin" => Platform::LinkedIn,
            _ => Platform::Other(value.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Platform::General => "general",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::LinkedIn => "linkedin",
            Platform::Other(name) => name,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn caption_prompt(platform: &Platform) -> String {
    format!(
        "Generate 5 short, catchy and creative quotes for the following image, \
         tailored for a {platform} post. The quotes should be inspiring, witty, or \
         thought-provoking. Return the output as a JSON array of strings. For example: \
         [\"This is the first quote.\", \"This is the second quote.\"]. Do not include \
         any other text or markdown formatting in your response, only the JSON array."
    )
}
