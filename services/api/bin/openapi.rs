use speakease_api::router::ApiDoc;
use std::path::PathBuf;
use utoipa::OpenApi;

/// Generates the OpenAPI document and writes it to a file.
fn generate_openapi(
    api_doc: utoipa::openapi::OpenApi,
    path: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = api_doc.to_pretty_json()?;
    std::fs::write(path, json)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi.json"));
    generate_openapi(ApiDoc::openapi(), &path)?;
    println!("Wrote OpenAPI document to {}", path.display());
    Ok(())
}
