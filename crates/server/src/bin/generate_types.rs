use std::{env, fs, path::PathBuf};

use ts_rs::TS;

fn generate_types_content() -> String {
    let decls = [
        db::models::project::GenerationStatus::decl(),
        db::models::project::PromptKind::decl(),
        db::models::project::AttemptOutcome::decl(),
        db::models::project::PromptHistoryEntry::decl(),
        db::models::project::ProjectSnapshot::decl(),
        services::services::backend_detection::ProjectKind::decl(),
        utils::response::ErrorResponse::decl(),
        utils::response::SuccessResponse::decl(),
        server::routes::generate::GenerateResponse::decl(),
        server::routes::health::HealthResponse::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|d| {
            let trimmed = d.trim_start();
            if trimmed.starts_with("export") {
                trimmed.to_string()
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "// This file was generated by `generate_types`. Do not edit it manually.\n\n{body}\n"
    )
}

fn main() -> anyhow::Result<()> {
    let content = generate_types_content();
    match env::args().nth(1) {
        Some(path) => {
            let path = PathBuf::from(path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, content)?;
            println!("Wrote TypeScript types to {}", path.display());
        }
        None => print!("{content}"),
    }
    Ok(())
}
