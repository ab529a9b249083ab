use redox_log::{OutputBuilder, RedoxLogger};

pub fn output_level() -> log::LevelFilter {
    log::LevelFilter::Info
}

pub fn file_level() -> log::LevelFilter {
    log::LevelFilter::Info
}

/// Configures logging for one class driver instance.
///
/// Output always goes to stderr. On Redox, a plain and an ANSI-colored log file named after
/// `logfile_base` are added under the `category/subcategory` logging scheme. Fails if a logger was
/// already installed for this process.
#[cfg_attr(not(target_os = "redox"), allow(unused_variables, unused_mut))]
pub fn setup_logging(
    category: &str,
    subcategory: &str,
    logfile_base: &str,
    output_level: log::LevelFilter,
    file_level: log::LevelFilter,
) -> Result<(), log::SetLoggerError> {
    let mut logger = RedoxLogger::new().with_output(
        OutputBuilder::stderr()
            .with_filter(output_level)
            .with_ansi_escape_codes()
            .flush_on_newline(true)
            .build(),
    );

    #[cfg(target_os = "redox")]
    for (suffix, ansi) in [("log", false), ("ansi.log", true)] {
        let name = format!("{logfile_base}.{suffix}");
        match OutputBuilder::in_redox_logging_scheme(category, subcategory, &name) {
            Ok(b) => {
                let b = b.with_filter(file_level).flush_on_newline(true);
                let b = if ansi { b.with_ansi_escape_codes() } else { b };
                logger = logger.with_output(b.build());
            }
            Err(error) => eprintln!("Failed to create {name}: {error}"),
        }
    }

    logger.enable().map(|_| ())
}
