use clap::{ArgAction, ArgMatches, Parser};
use wlx_randr::{
    ValidationError,
    changes::{Directive, OutputDirective},
};

const OUTPUT_OPTIONS: &str = "Output options (apply to the preceding --output)";

/// Query and reconfigure outputs of a wlroots-based compositor
#[derive(Parser, Debug)]
#[command(name = "wlx-randr", version)]
pub struct Cli {
    /// Test the configuration without applying it
    #[arg(long)]
    pub dryrun: bool,

    /// Print the output state as JSON
    #[arg(long)]
    pub json: bool,

    /// Select the output that following options apply to
    #[arg(long, value_name = "NAME", action = ArgAction::Append)]
    pub output: Vec<String>,

    /// Enable the output
    #[arg(
        long, help_heading = OUTPUT_OPTIONS, action = ArgAction::Append,
        num_args = 0, default_missing_value = "true"
    )]
    pub on: Vec<bool>,

    /// Disable the output
    #[arg(
        long, help_heading = OUTPUT_OPTIONS, action = ArgAction::Append,
        num_args = 0, default_missing_value = "true"
    )]
    pub off: Vec<bool>,

    /// Enable the output if disabled, disable it otherwise
    #[arg(
        long, help_heading = OUTPUT_OPTIONS, action = ArgAction::Append,
        num_args = 0, default_missing_value = "true"
    )]
    pub toggle: Vec<bool>,

    /// Switch to an advertised mode
    #[arg(
        long, help_heading = OUTPUT_OPTIONS, action = ArgAction::Append,
        value_name = "WIDTHxHEIGHT[@REFRESHHz]"
    )]
    pub mode: Vec<String>,

    /// Switch to a mode the output does not advertise
    #[arg(
        long, help_heading = OUTPUT_OPTIONS, action = ArgAction::Append,
        value_name = "WIDTHxHEIGHT[@REFRESHHz]"
    )]
    pub custom_mode: Vec<String>,

    /// Switch to the preferred mode
    #[arg(
        long, help_heading = OUTPUT_OPTIONS, action = ArgAction::Append,
        num_args = 0, default_missing_value = "true"
    )]
    pub preferred: Vec<bool>,

    /// Move the output in the global coordinate space
    #[arg(
        long, help_heading = OUTPUT_OPTIONS, action = ArgAction::Append,
        value_name = "X,Y", allow_hyphen_values = true
    )]
    pub pos: Vec<String>,

    /// normal|90|180|270|flipped|flipped-90|flipped-180|flipped-270
    #[arg(
        long, help_heading = OUTPUT_OPTIONS, action = ArgAction::Append,
        value_name = "TRANSFORM"
    )]
    pub transform: Vec<String>,

    /// Scale factor
    #[arg(
        long, help_heading = OUTPUT_OPTIONS, action = ArgAction::Append,
        value_name = "FACTOR", allow_hyphen_values = true
    )]
    pub scale: Vec<String>,

    /// enabled|disabled
    #[arg(
        long, help_heading = OUTPUT_OPTIONS, action = ArgAction::Append,
        value_name = "STATE"
    )]
    pub adaptive_sync: Vec<String>,
}

enum Token {
    Output(String),
    Directive(Directive),
}

/// Flags are modelled as value-less options so clap keeps the index of
/// every occurrence, not only the last one.
fn flag_indices(matches: &ArgMatches, id: &str) -> Vec<usize> {
    matches
        .indices_of(id)
        .map(Iterator::collect)
        .unwrap_or_default()
}

fn indexed_values(matches: &ArgMatches, id: &str) -> Vec<(usize, String)> {
    match (matches.indices_of(id), matches.get_many::<String>(id)) {
        (Some(indices), Some(values)) => indices.zip(values.cloned()).collect(),
        _ => Vec::new(),
    }
}

/// Rebuilds the per-output directives in the order they were written.
pub fn directives(
    matches: &ArgMatches,
) -> Result<Vec<OutputDirective>, ValidationError> {
    let mut tokens: Vec<(usize, Token)> = Vec::new();

    tokens.extend(
        indexed_values(matches, "output")
            .into_iter()
            .map(|(index, name)| (index, Token::Output(name))),
    );

    let flags: [(&str, fn() -> Directive); 4] = [
        ("on", || Directive::On),
        ("off", || Directive::Off),
        ("toggle", || Directive::Toggle),
        ("preferred", || Directive::Preferred),
    ];
    for (id, directive) in flags {
        tokens.extend(
            flag_indices(matches, id)
                .into_iter()
                .map(|index| (index, Token::Directive(directive()))),
        );
    }

    let valued: [(&str, fn(String) -> Directive); 6] = [
        ("mode", Directive::Mode),
        ("custom_mode", Directive::CustomMode),
        ("pos", Directive::Position),
        ("transform", Directive::Transform),
        ("scale", Directive::Scale),
        ("adaptive_sync", Directive::AdaptiveSync),
    ];
    for (id, directive) in valued {
        tokens.extend(
            indexed_values(matches, id)
                .into_iter()
                .map(|(index, value)| (index, Token::Directive(directive(value)))),
        );
    }

    tokens.sort_by_key(|(index, _)| *index);

    let mut current: Option<String> = None;
    let mut directives = Vec::new();
    for (_, token) in tokens {
        match token {
            Token::Output(name) => current = Some(name),
            Token::Directive(directive) => {
                let output = current.clone().ok_or_else(|| {
                    ValidationError::NoOutputSelected(
                        directive.flag().to_string(),
                    )
                })?;
                directives.push(OutputDirective { output, directive });
            }
        }
    }
    Ok(directives)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Result<Vec<OutputDirective>, ValidationError> {
        let matches = Cli::command()
            .try_get_matches_from(
                std::iter::once("wlx-randr").chain(args.iter().copied()),
            )
            .unwrap();
        directives(&matches)
    }

    fn on(output: &str, directive: Directive) -> OutputDirective {
        OutputDirective {
            output: output.into(),
            directive,
        }
    }

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn directives_follow_command_line_order() {
        let parsed = parse(&[
            "--output", "DP-1", "--off", "--output", "HDMI-A-1", "--on",
            "--mode", "1920x1080@60Hz", "--output", "DP-1", "--on",
            "--scale", "2",
        ])
        .unwrap();

        assert_eq!(
            parsed,
            vec![
                on("DP-1", Directive::Off),
                on("HDMI-A-1", Directive::On),
                on("HDMI-A-1", Directive::Mode("1920x1080@60Hz".into())),
                on("DP-1", Directive::On),
                on("DP-1", Directive::Scale("2".into())),
            ]
        );
    }

    #[test]
    fn repeated_flags_keep_every_occurrence() {
        let parsed = parse(&[
            "--output", "DP-1", "--toggle", "--preferred", "--toggle",
        ])
        .unwrap();
        assert_eq!(
            parsed,
            vec![
                on("DP-1", Directive::Toggle),
                on("DP-1", Directive::Preferred),
                on("DP-1", Directive::Toggle),
            ]
        );
    }

    #[test]
    fn negative_positions_are_values() {
        let parsed = parse(&[
            "--output", "DP-1", "--pos", "-1920,0", "--transform", "90",
            "--adaptive-sync", "enabled", "--custom-mode", "1366x768",
        ])
        .unwrap();
        assert_eq!(
            parsed,
            vec![
                on("DP-1", Directive::Position("-1920,0".into())),
                on("DP-1", Directive::Transform("90".into())),
                on("DP-1", Directive::AdaptiveSync("enabled".into())),
                on("DP-1", Directive::CustomMode("1366x768".into())),
            ]
        );
    }

    #[test]
    fn directive_without_output_is_rejected() {
        assert_eq!(
            parse(&["--on", "--output", "DP-1"]),
            Err(ValidationError::NoOutputSelected("on".into()))
        );
    }

    #[test]
    fn query_has_no_directives() {
        assert_eq!(parse(&["--json"]), Ok(Vec::new()));
        assert_eq!(parse(&["--output", "DP-1"]), Ok(Vec::new()));

        let matches = Cli::command()
            .try_get_matches_from(["wlx-randr", "--dryrun", "--json"])
            .unwrap();
        let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)
            .unwrap();
        assert!(cli.dryrun);
        assert!(cli.json);
    }
}
