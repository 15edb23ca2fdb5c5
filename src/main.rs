use log::warn;
use punchlist::ReportBuilder;
use std::path::PathBuf;
use std::process::ExitCode;

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name).ok().as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let json_path = std::env::var("JSON_PATH").unwrap_or_else(|_| "test_data.json".to_string());
    let out_path = std::env::var("OUT_PATH").unwrap_or_else(|_| "report.pdf".to_string());

    let mut builder = ReportBuilder::new(&json_path, &out_path)
        .verbose_media(env_flag("VERBOSE_MEDIA"))
        .timing(env_flag("PUNCHLIST_TIMING"));

    if let Ok(template) = std::env::var("TEMPLATE_PATH") {
        let template = PathBuf::from(template);
        if template.exists() {
            builder = builder.with_template(template);
        } else {
            warn!(
                "TEMPLATE_PATH {} does not exist, rendering freestanding report",
                template.display()
            );
        }
    }

    match builder.run() {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
