// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! quickedit binary entry point.

use std::sync::Arc;

use clap::Parser;

use quickedit::cli::{exit_code, Cli, EXIT_FAILURE};
use quickedit::logging;
use quickedit::output::{print_error, print_warning, DeltaPrinter, OutputWriter};
use quickedit::runtime::RuntimeBuilder;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init();
    let code = run(cli).await;
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    let mut builder = match RuntimeBuilder::from_file(cli.config.as_deref()) {
        Ok(builder) => builder,
        Err(e) => {
            print_error(e);
            return EXIT_FAILURE;
        }
    };
    cli.apply_overrides(builder.config_mut());

    if let Some(path) = &cli.capture {
        builder = match builder.with_capture_file(path) {
            Ok(builder) => builder,
            Err(e) => {
                print_error(format_args!("cannot open capture file {}: {}", path.display(), e));
                return EXIT_FAILURE;
            }
        };
    }

    let selected_text = match cli.read_selected_text() {
        Ok(text) => text,
        Err(e) => {
            print_error(format_args!("cannot read selected text: {}", e));
            return EXIT_FAILURE;
        }
    };
    if selected_text.as_deref().is_some_and(|t| t.trim().is_empty()) {
        print_warning("selected text is empty");
    }

    let runtime = Arc::new(builder.build());
    let printer = DeltaPrinter::stdout();
    let mut request = cli.run_request(selected_text);
    if cli.streams() {
        let sink = printer.clone();
        request = request.on_delta(move |delta| sink.write(delta));
    }

    let interrupt = tokio::spawn({
        let runtime = Arc::clone(&runtime);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("interrupt received");
                runtime.cancel();
            }
        }
    });

    let outcome = runtime.run(request).await;
    interrupt.abort();
    // process::exit skips destructors, so the agent must be stopped here.
    runtime.dispose();

    let _ = printer.finish_line();
    let mut output = OutputWriter::new(std::io::stdout(), cli.output_format);
    match outcome {
        Ok(result) => {
            if let Err(e) = output.write_result(&result, printer.wrote_any()) {
                print_error(e);
                return EXIT_FAILURE;
            }
            result.exit_code
        }
        Err(err) => {
            let code = exit_code(&err);
            if let Err(e) = output.write_error(&err) {
                print_error(e);
            }
            code
        }
    }
}
