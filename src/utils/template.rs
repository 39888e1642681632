//! String template rendering utilities.

pub struct TemplateVars;

impl TemplateVars {
    pub const WORKERS: &'static str = "workers";
    pub const OUTPUT: &'static str = "output";
    pub const ENVIRONMENT: &'static str = "environment";
    pub const BRANCH: &'static str = "branch";
    pub const VERSION: &'static str = "version";
}

pub fn render(template: &str, variables: &[(&str, &str)]) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}

pub fn is_present(template: &str, key: &str) -> bool {
    let placeholder = format!("{{{{{}}}}}", key);
    template.contains(&placeholder)
}
