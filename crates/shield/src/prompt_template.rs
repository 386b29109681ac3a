use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

use crate::hazard::find_basin;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
pub(crate) const BRIEFING_TEMPLATE: &str = include_str!("prompts/briefing.md");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

pub fn load_prompt_file<T: Serialize>(
    template_file: impl AsRef<Path>,
    context_data: &T,
) -> Result<String, TeraError> {
    let template_content = fs::read_to_string(template_file.as_ref())
        .map_err(|e| TeraError::chain("Failed to read template file", e))?;
    load_prompt(&template_content, context_data)
}

#[derive(Serialize)]
struct RegionView<'a> {
    id: &'a str,
    name: &'a str,
    focus: &'a str,
}

#[derive(Serialize)]
struct SystemContext<'a> {
    region: RegionView<'a>,
}

/// Renders the fixed system instruction for the active region
///
/// The region id is the only input; name and focus come from the basin catalogue. An
/// override file, when configured, replaces the bundled template.
#[derive(Debug, Clone, Default)]
pub struct SystemInstruction {
    template_file: Option<PathBuf>,
}

impl SystemInstruction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(template_file: impl Into<PathBuf>) -> Self {
        Self {
            template_file: Some(template_file.into()),
        }
    }

    pub fn render(&self, region_id: &str) -> Result<String, TeraError> {
        let (name, focus) = match find_basin(region_id) {
            Some(basin) => (basin.name, basin.focus),
            None => ("Unknown", "no regional focus"),
        };
        let context = SystemContext {
            region: RegionView {
                id: region_id,
                name,
                focus,
            },
        };
        match &self.template_file {
            Some(path) => load_prompt_file(path, &context),
            None => load_prompt(SYSTEM_TEMPLATE, &context),
        }
    }
}
