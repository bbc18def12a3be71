//! Example of reading a whitespace-separated series of observations from a text file and
//! reporting its changepoints.

use std::{error::Error, fs::read_to_string};

use capa::{Capa, Family};

pub fn main() -> Result<(), Box<dyn Error>> {
    // Try to read each argument as a file
    for arg in std::env::args().skip(1) {
        eprintln!("Reading file '{arg}'");

        let contents = read_to_string(&arg)?;
        let signal: Vec<f64> = contents
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()?;

        eprintln!("Mean family:");
        match Capa::new()
            .with_family(Family::Mean)
            .with_penalty_change(2.0 * (signal.len() as f64).ln())
            .solve(&signal)
        {
            Ok(solution) => {
                for changepoint in solution.changepoints() {
                    println!(
                        "{:?}: [{}, {}]",
                        changepoint.option, changepoint.start, changepoint.end
                    );
                }
            }
            Err(err) => eprintln!("Error running capa: {err}"),
        }
    }

    Ok(())
}
