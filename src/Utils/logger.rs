use csv::Writer;
use nalgebra::{DMatrix, DVector};
use std::fs::File;
use std::io;

/// save an observation matrix with its time mesh as a csv table, one header per
/// column plus the leading time column
pub fn save_matrix_to_csv(
    matrix: &DMatrix<f64>,
    headers: &[String],
    filename: &str,
    x_mesh: &DVector<f64>,
    arg: &str,
) -> io::Result<()> {
    assert_eq!(
        matrix.ncols(),
        headers.len(),
        "one header per matrix column is required"
    );
    assert_eq!(
        matrix.nrows(),
        x_mesh.len(),
        "time mesh length must match the number of rows"
    );
    let file = File::create(filename)?;
    let mut writer = Writer::from_writer(file);

    let mut headers_with_x = Vec::new();
    headers_with_x.push(arg.to_string());
    headers_with_x.extend(headers.iter().cloned());
    writer.write_record(&headers_with_x)?;

    for (i, row) in matrix.row_iter().enumerate() {
        let mut row_data = Vec::new();
        row_data.push(x_mesh[i].to_string());
        row_data.extend(row.iter().map(|&val| val.to_string()));
        writer.write_record(&row_data)?;
    }

    writer.flush()?;
    Ok(())
}

/// save the best-fitness-per-generation history of a genetic search
pub fn save_history_csv(history: &[f64], filename: &str) -> io::Result<()> {
    let file = File::create(filename)?;
    let mut writer = Writer::from_writer(file);
    writer.write_record(["generation", "best_fitness"])?;
    for (generation, best) in history.iter().enumerate() {
        writer.write_record(&[generation.to_string(), best.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}
