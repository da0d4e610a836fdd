// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `{{name}}` command templates. Every substituted value is quoted for
//! `/bin/sh`, so episode titles and paths can never inject shell syntax.

use std::collections::BTreeMap;

use crate::error::TemplateError;

/// Values available to a template, keyed by placeholder name
#[derive(Debug, Clone, Default)]
pub struct TemplateValues {
    values: BTreeMap<&'static str, String>,
}

impl TemplateValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &'static str, value: impl Into<String>) -> &mut Self {
        self.values.insert(name, value.into());
        self
    }

    pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Substitute all placeholders in `template`
pub fn render(template: &str, values: &TemplateValues) -> Result<String, TemplateError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(open) = rest.find("{{") {
        rendered.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let close = after_open.find("}}").ok_or(TemplateError::Unclosed {
            offset: offset + open,
        })?;

        let name = after_open[..close].trim();
        let value = values
            .get(name)
            .ok_or_else(|| TemplateError::UnknownPlaceholder {
                name: name.to_string(),
            })?;
        let quoted = shlex::try_quote(value).map_err(|_| TemplateError::Unquotable {
            name: name.to_string(),
        })?;
        rendered.push_str(&quoted);

        let consumed = open + 2 + close + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }

    rendered.push_str(rest);
    Ok(rendered)
}
