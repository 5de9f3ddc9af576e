//! Interactive menu shown when no mode flag is given.

use std::io::{self, BufRead, Write};

use super::Mode;

const OPTIONS: [(&str, Mode); 6] = [
    ("Start the web page server", Mode::Web),
    ("Run the editor bridge", Mode::Extension),
    ("Set up Ollama (start it and pull the default model)", Mode::Ollama),
    ("Create the customized coding model", Mode::Customize),
    ("Show status", Mode::Status),
    ("Quit", Mode::Quit),
];

/// Print the menu and read choices from stdin until one is valid.
///
/// End of input counts as quitting.
pub(crate) fn choose() -> miette::Result<Mode> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = io::stdout();

    println!("Lumen");
    println!("=====");
    println!();
    for (i, (label, _)) in OPTIONS.iter().enumerate() {
        println!("  {}. {}", i + 1, label);
    }
    println!();

    loop {
        print!("Choose an option [1-{}]: ", OPTIONS.len());
        stdout
            .flush()
            .map_err(|e| miette::miette!("Failed to write menu: {}", e))?;

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .map_err(|e| miette::miette!("Failed to read choice: {}", e))?;
        if read == 0 {
            return Ok(Mode::Quit);
        }

        match parse_choice(&line) {
            Some(mode) => return Ok(mode),
            None => println!("Invalid choice: {}", line.trim()),
        }
    }
}

/// Map a typed menu number to a mode.
pub(crate) fn parse_choice(input: &str) -> Option<Mode> {
    let index: usize = input.trim().parse().ok()?;
    index
        .checked_sub(1)
        .and_then(|i| OPTIONS.get(i))
        .map(|(_, mode)| *mode)
}
