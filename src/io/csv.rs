/*!
# Saving chains to CSV

Writes a sampling run's chain table to a CSV file. Enable via the `csv` feature.
*/

use std::error::Error;
use std::fs::File;

use csv::Writer;
use ndarray::{ArrayView1, Axis};

use crate::summary::{ChainTable, SampleOutput};

/**
Saves a chain table and its objective values as a CSV file.

The header row holds the parameter names, fixed parameters included, followed
by `ss`. Each subsequent row is one chain row.

# Examples

```rust
use thetafit::adaptive_metropolis::{sample, SamplerOptions};
use thetafit::io::csv::save_csv;
use thetafit::objective::ParameterValues;
use thetafit::parameters::{Parameter, ParameterSet};

let params = ParameterSet::from(vec![Parameter::new("a", 0.0), Parameter::new("b", 1.0).fixed()]);
let ssfun = |p: &ParameterValues, _: &()| p["a"].powi(2);
let out = sample(&ssfun, &(), &params, &SamplerOptions::new(1.0).nsimu(10).set_seed(1))?;

save_csv(&out.chain, out.sschain.view(), "/tmp/chain.csv")?;
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/
pub fn save_csv(
    chain: &ChainTable,
    sschain: ArrayView1<f64>,
    filename: &str,
) -> Result<(), Box<dyn Error>> {
    if sschain.len() != chain.nrows() {
        return Err(format!(
            "Expected {} objective values, got {}.",
            chain.nrows(),
            sschain.len()
        )
        .into());
    }
    let mut wtr = Writer::from_writer(File::create(filename)?);

    let mut header: Vec<String> = chain.names().to_vec();
    header.push("ss".to_string());
    wtr.write_record(&header)?;

    for (row, ss) in chain.values().axis_iter(Axis(0)).zip(sschain.iter()) {
        let mut record: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        record.push(ss.to_string());
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Saves the chain of a finished run, see [`save_csv`].
pub fn save_output_csv(output: &SampleOutput, filename: &str) -> Result<(), Box<dyn Error>> {
    save_csv(&output.chain, output.sschain.view(), filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use csv::Reader;
    use ndarray::{arr1, arr2};
    use std::fs;
    use tempfile::NamedTempFile;

    fn table() -> ChainTable {
        ChainTable::new(
            vec!["a".into(), "b".into()],
            arr2(&[[1.0, 5.0], [1.5, 5.0], [1.5, 5.0]]),
        )
    }

    #[test]
    fn test_save_csv_rows() {
        let file = NamedTempFile::new().expect("Could not create temp file");
        let filename = file.path().to_str().unwrap();

        save_csv(&table(), arr1(&[4.0, 2.25, 2.25]).view(), filename).unwrap();

        let contents = fs::read_to_string(filename).unwrap();
        let expected = "\
a,b,ss
1,5,4
1.5,5,2.25
1.5,5,2.25";
        assert_eq!(contents.trim(), expected);
    }

    #[test]
    fn test_save_csv_reads_back() -> Result<(), Box<dyn std::error::Error>> {
        let file = NamedTempFile::new()?;
        let filename = file.path().to_str().unwrap();
        save_csv(&table(), arr1(&[4.0, 2.25, 2.25]).view(), filename)?;

        let mut rdr = Reader::from_path(filename)?;
        let headers = rdr.headers()?.clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), vec!["a", "b", "ss"]);
        let records: Vec<_> = rdr.records().collect::<Result<_, _>>()?;
        assert_eq!(records.len(), 3);
        assert_eq!(records[1][0].parse::<f64>()?, 1.5);
        Ok(())
    }

    #[test]
    fn test_save_csv_length_mismatch() {
        let file = NamedTempFile::new().expect("Could not create temp file");
        let filename = file.path().to_str().unwrap();
        let result = save_csv(&table(), arr1(&[4.0]).view(), filename);
        assert!(result.is_err());
    }
}
