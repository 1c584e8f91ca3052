use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::warn;

use plugcheck::{
    register_plugin, resolve_plugin_dir, validate_all, RegistryEntry, ValidationReport, Validator,
};

use super::{Format, Target};

pub(crate) struct Context {
    pub validator: Validator,
    pub plugins_dir: PathBuf,
    /// Registry to update; `None` unless `--register` was given.
    pub registry: Option<PathBuf>,
    pub jobs: usize,
    pub format: Format,
}

pub(crate) fn run(ctx: &Context, target: Target) {
    let code = if target.all {
        run_all(ctx)
    } else if let Some(id) = target.id {
        match resolve_plugin_dir(&ctx.plugins_dir, &id) {
            Ok(dir) => run_single(ctx, &id, &dir),
            Err(e) => {
                eprintln!("plugcheck: {e}");
                1
            }
        }
    } else if let Some(dir) = target.path {
        let id = plugcheck::plugin_id_from_path(&dir);
        run_single(ctx, &id, &dir)
    } else {
        // The argument group requires one of the three.
        1
    };
    std::process::exit(code);
}

fn run_single(ctx: &Context, id: &str, dir: &Path) -> i32 {
    let report = match ctx.validator.validate(id, dir) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("plugcheck: {e}");
            return 1;
        }
    };

    match ctx.format {
        Format::Text => print!("{}", report.render()),
        Format::Json => print_json(&report),
    }

    if report.verdict().is_passing() {
        register(ctx, &report);
        0
    } else {
        1
    }
}

fn run_all(ctx: &Context) -> i32 {
    let summary = match validate_all(&ctx.validator, &ctx.plugins_dir, ctx.jobs) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!(
                "plugcheck: cannot read plugins directory {}: {e}",
                ctx.plugins_dir.display()
            );
            return 1;
        }
    };

    match ctx.format {
        Format::Text => {
            for report in &summary.reports {
                println!("{}", report.render());
            }
            print!("{}", summary.render());
        }
        Format::Json => print_json(&summary),
    }

    for report in summary.reports.iter().filter(|r| r.verdict().is_passing()) {
        register(ctx, report);
    }
    summary.exit_code()
}

/// Best-effort registry update; failures never change the exit status.
fn register(ctx: &Context, report: &ValidationReport) {
    let Some(registry) = ctx.registry.as_deref() else {
        return;
    };
    let id = report.plugin_id();
    let entry = RegistryEntry::from_plugin_dir(
        report.plugin_path(),
        id,
        ctx.validator.layout(),
        Utc::now(),
    );
    match register_plugin(registry, id, entry) {
        Ok(()) => eprintln!("Plugin {id} added to registry {}", registry.display()),
        Err(e) => {
            warn!(plugin = id, error = %e, "registry update failed");
            eprintln!("plugcheck: failed to register {id}: {e}");
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("plugcheck: {e}"),
    }
}
