use accel_cli::cli::Cli;
use accel_cli::error::CliError;
use accel_cli::output::{self, CommandResult, OutputFormat};
use accel_cli::{commands, logging};
use clap::Parser;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;
	let command = cli.command.name();

	if let Err(err) = commands::dispatch(cli).await {
		handle_error(&err, command, format);
		std::process::exit(1);
	}
}

fn handle_error(err: &CliError, command: &str, format: OutputFormat) {
	let cmd_error = err.to_command_error();
	output::print_error_stderr(&cmd_error);

	if format == OutputFormat::Json {
		let result: CommandResult<()> = CommandResult::failure(command, cmd_error);
		output::print_result(&result, format);
	}
}
