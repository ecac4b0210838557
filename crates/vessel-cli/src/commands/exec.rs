//! `vessel exec` — Execute a command inside a running container.

use clap::Args;
use vessel_runtime::engine::Engine;

/// Arguments for the `exec` command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Container ID or name.
    pub container: String,

    /// Command to execute.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `exec` command.
///
/// Joins the target container's namespaces and runs the given command,
/// forwarding its output and exit code.
///
/// # Errors
///
/// Returns an error if the container is not running or namespace
/// joining fails.
pub fn execute(engine: &Engine, args: &ExecArgs) -> anyhow::Result<()> {
    let output = engine.exec(&args.container, &args.command)?;

    if !output.stdout.is_empty() {
        print!("{}", output.stdout);
    }
    if !output.stderr.is_empty() {
        #[allow(clippy::print_stderr)]
        {
            eprint!("{}", output.stderr);
        }
    }

    std::process::exit(output.exit_code);
}
