//! Builds the text sent to the model for a generation or refinement attempt.

use db::models::project::{FileMapping, PromptHistoryEntry, PromptKind};
use thiserror::Error;

use super::{
    backend_detection::ProjectKind,
    response_parser::{RequiredFile, required_files},
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("composed prompt is {size} characters, limit is {limit}")]
    PromptTooLarge { size: usize, limit: usize },
}

/// Everything one attempt's prompt depends on
#[derive(Debug, Clone, Copy)]
pub struct PromptRequest<'a> {
    pub user_prompt: &'a str,
    pub mode: PromptKind,
    pub kind: ProjectKind,
    /// Current files, embedded in refinement mode
    pub prior_files: Option<&'a FileMapping>,
    /// Earlier prompts, listed in refinement mode
    pub history: &'a [PromptHistoryEntry],
    /// Files the previous attempt left out
    pub missing: &'a [String],
}

impl<'a> PromptRequest<'a> {
    pub fn initial(user_prompt: &'a str, kind: ProjectKind) -> Self {
        Self {
            user_prompt,
            mode: PromptKind::Initial,
            kind,
            prior_files: None,
            history: &[],
            missing: &[],
        }
    }

    pub fn refinement(
        user_prompt: &'a str,
        kind: ProjectKind,
        prior_files: &'a FileMapping,
        history: &'a [PromptHistoryEntry],
    ) -> Self {
        Self {
            user_prompt,
            mode: PromptKind::Refinement,
            kind,
            prior_files: Some(prior_files),
            history,
            missing: &[],
        }
    }

    pub fn with_missing(self, missing: &'a [String]) -> Self {
        Self { missing, ..self }
    }
}

const ROLE: &str = "You are a professional web developer and UI/UX designer.";

const DESIGN_REQUIREMENTS: &str = r#"## Design Requirements
- Make the website MODERN, BEAUTIFUL and VISUALLY APPEALING
- Use modern CSS techniques: flexbox, grid, gradients, shadows and smooth animations
- Apply an attractive color scheme and contemporary typography
- Ensure fully responsive design for mobile, tablet and desktop
- Add subtle hover effects and micro-interactions
- Use proper spacing and a clear visual hierarchy
"#;

const CONTENT_GUIDELINES: &str = r#"## Content Guidelines
- Include relevant, realistic content (no Lorem ipsum)
- Add appropriate headings, descriptions and calls-to-action
- Use semantic HTML structure for accessibility
"#;

const FULL_STACK_GUIDELINES: &str = r#"## Backend Guidelines
- The backend is a Python Flask application in `app.py` serving the frontend and a JSON REST API
- Keep MySQL access in `database.py`, reading connection settings from environment variables
- `schema.sql` creates every table the site needs and is safe to run on an empty database
- The frontend calls the API with `fetch` and shows clear success and error messages
"#;

const OUTPUT_FORMAT: &str = r#"## Output Format
Return every file as a marker line with the file name in bold followed by a fenced code block,
exactly like this:

**index.html**:
```html
[complete HTML code here]
```

**style.css**:
```css
[complete CSS code here]
```

If you need JavaScript for interactions, add:
**script.js**:
```javascript
[complete JavaScript code here]
```

Use relative paths such as `templates/index.html` for files in subdirectories.
Every file must contain its complete content; never abbreviate or elide code.
"#;

/// Compose the prompt and enforce the size limit (in characters).
pub fn compose(request: &PromptRequest<'_>, limit: usize) -> Result<String, PromptError> {
    let prompt = render(request);
    let size = prompt.chars().count();
    if size > limit {
        return Err(PromptError::PromptTooLarge { size, limit });
    }
    Ok(prompt)
}

fn render(request: &PromptRequest<'_>) -> String {
    let mut prompt = String::new();
    let required = required_files(request.kind);

    match (request.mode, request.prior_files) {
        (PromptKind::Refinement, Some(files)) => {
            prompt.push_str(ROLE);
            prompt.push_str(" Here are the existing files for a website:\n\n");
            push_history(&mut prompt, request.history);
            for (name, content) in files.iter() {
                push_file(&mut prompt, name, content);
            }
            prompt.push_str(&format!(
                "Please improve and modify this website based on this request:\n\n{}\n\n",
                request.user_prompt
            ));
            prompt.push_str(DESIGN_REQUIREMENTS);
            prompt.push('\n');
            push_required(&mut prompt, required);
            if request.kind == ProjectKind::FullStack {
                prompt.push_str(FULL_STACK_GUIDELINES);
                prompt.push('\n');
            }
            prompt.push_str(
                "Provide the complete, updated code for ALL files (even if only some changed).\n\n",
            );
            prompt.push_str(OUTPUT_FORMAT);
        }
        _ => {
            prompt.push_str(ROLE);
            prompt.push_str(" Create a stunning, modern website.\n\n");
            prompt.push_str(DESIGN_REQUIREMENTS);
            prompt.push('\n');
            push_required(&mut prompt, required);
            if request.kind == ProjectKind::FullStack {
                prompt.push_str(FULL_STACK_GUIDELINES);
                prompt.push('\n');
            }
            prompt.push_str(CONTENT_GUIDELINES);
            prompt.push('\n');
            prompt.push_str(OUTPUT_FORMAT);
            prompt.push_str(&format!(
                "\n## Website Request\n{}\n",
                request.user_prompt
            ));
        }
    }

    if !request.missing.is_empty() {
        prompt.push_str(&format!(
            "\n## Missing Files\nYour previous answer was incomplete, you forgot: {}.\n\
             Return the complete code for ALL required files again, each in its own labeled block.\n",
            request.missing.join(", ")
        ));
    }

    prompt
}

fn push_required(prompt: &mut String, required: &[RequiredFile]) {
    prompt.push_str("## Required Files\n");
    for file in required {
        prompt.push_str(&format!("- `{}`: {}\n", file.name, file.purpose));
    }
    prompt.push('\n');
}

fn push_history(prompt: &mut String, history: &[PromptHistoryEntry]) {
    if history.is_empty() {
        return;
    }
    prompt.push_str("## Previous Requests\n");
    for (i, entry) in history.iter().enumerate() {
        prompt.push_str(&format!("{}. ({}) {}\n", i + 1, entry.kind, entry.text));
    }
    prompt.push('\n');
}

/// Embed a file in the same delimiter format the model answers in. The fence
/// is longer than any backtick run inside the content.
fn push_file(prompt: &mut String, name: &str, content: &str) {
    let longest_run = content
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest_run.max(2) + 1);

    prompt.push_str(&format!("**{name}**:\n{fence}\n{content}"));
    if !content.is_empty() && !content.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str(&format!("{fence}\n\n"));
}
