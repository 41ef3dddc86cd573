//! OFF (Object File Format) support.
//!
//! The layout is a header line `OFF`, a counts line `V F E`, then `V` vertex
//! lines `x y z` and `F` face lines `n i0 i1 ... i(n-1)`. Polygons with more
//! than three corners are fan-triangulated around their first corner. Text
//! after `#` is a comment and blank lines are skipped. Extra values on a
//! vertex or face line (colors) are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Point3;

use crate::error::{MeshError, Result};
use crate::mesh::TriMesh;

/// Upper bound on up-front allocation from header counts.
const MAX_RESERVE: usize = 1 << 16;

/// Load a mesh from an OFF file.
///
/// # Example
///
/// ```no_run
/// use pliant::io::off;
///
/// let mesh = off::load("bunny.off").unwrap();
/// println!("{} vertices", mesh.num_vertices());
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriMesh> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read(BufReader::new(file)).map_err(|e| match e {
        MeshError::ParseError { .. } => MeshError::LoadError {
            path: path.to_path_buf(),
            message: e.to_string(),
        },
        other => other,
    })
}

/// Save a mesh to an OFF file.
pub fn save<P: AsRef<Path>>(mesh: &TriMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write(mesh, &mut writer)?;
    writer.flush().map_err(|e| MeshError::SaveError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Parse an OFF mesh from a reader.
///
/// # Example
///
/// ```
/// use pliant::io::off;
/// use std::io::Cursor;
///
/// let text = "OFF\n4 1 0\n0 0 0\n1 0 0\n1 1 0\n0 1 0\n4 0 1 2 3\n";
/// let mesh = off::read(Cursor::new(text)).unwrap();
/// assert_eq!(mesh.num_faces(), 2);
/// ```
pub fn read<R: BufRead>(reader: R) -> Result<TriMesh> {
    let mut lines = ContentLines::new(reader);

    let (line_no, header) = lines.next_line()?.ok_or_else(|| parse_error(0, "empty file"))?;
    let mut tokens = header.split_whitespace();
    if tokens.next() != Some("OFF") {
        return Err(parse_error(line_no, "missing OFF header"));
    }

    // Counts may share the header line.
    let mut counts: Vec<String> = tokens.map(str::to_string).collect();
    let mut counts_line = line_no;
    if counts.is_empty() {
        let (n, line) = lines
            .next_line()?
            .ok_or_else(|| parse_error(line_no, "missing element counts"))?;
        counts = line.split_whitespace().map(str::to_string).collect();
        counts_line = n;
    }
    if counts.len() < 2 {
        return Err(parse_error(counts_line, "expected vertex and face counts"));
    }
    let num_vertices: usize = parse_value(counts_line, &counts[0], "vertex count")?;
    let num_faces: usize = parse_value(counts_line, &counts[1], "face count")?;

    let mut positions = Vec::with_capacity(num_vertices.min(MAX_RESERVE));
    for _ in 0..num_vertices {
        let (n, line) = lines
            .next_line()?
            .ok_or_else(|| parse_error(counts_line, "unexpected end of file in vertex list"))?;
        let coords: Vec<&str> = line.split_whitespace().collect();
        if coords.len() < 3 {
            return Err(parse_error(n, "vertex needs three coordinates"));
        }
        positions.push(Point3::new(
            parse_value(n, coords[0], "coordinate")?,
            parse_value(n, coords[1], "coordinate")?,
            parse_value(n, coords[2], "coordinate")?,
        ));
    }

    let mut faces = Vec::with_capacity(num_faces.min(MAX_RESERVE));
    for _ in 0..num_faces {
        let (n, line) = lines
            .next_line()?
            .ok_or_else(|| parse_error(counts_line, "unexpected end of file in face list"))?;
        let mut values = line.split_whitespace();
        let corners: usize = match values.next() {
            Some(v) => parse_value(n, v, "corner count")?,
            None => return Err(parse_error(n, "empty face")),
        };
        if corners < 3 {
            return Err(parse_error(n, "face needs at least three corners"));
        }

        let polygon = values
            .take(corners)
            .map(|v| parse_value::<usize>(n, v, "vertex index"))
            .collect::<Result<Vec<_>>>()?;
        if polygon.len() != corners {
            return Err(parse_error(n, "face has fewer indices than its corner count"));
        }

        for k in 1..corners - 1 {
            faces.push([polygon[0], polygon[k], polygon[k + 1]]);
        }
    }

    log::debug!(
        "read OFF mesh: {} vertices, {} polygons, {} triangles",
        positions.len(),
        num_faces,
        faces.len()
    );
    TriMesh::new(positions, faces)
}

/// Write a mesh as OFF text.
pub fn write<W: Write>(mesh: &TriMesh, writer: &mut W) -> Result<()> {
    writeln!(writer, "OFF")?;
    writeln!(writer, "{} {} 0", mesh.num_vertices(), mesh.num_faces())?;
    for p in mesh.positions() {
        writeln!(writer, "{} {} {}", p.x, p.y, p.z)?;
    }
    for [a, b, c] in mesh.faces() {
        writeln!(writer, "3 {} {} {}", a, b, c)?;
    }
    Ok(())
}

/// Non-empty lines with comments stripped, numbered from 1.
struct ContentLines<R> {
    reader: R,
    line_no: usize,
    buffer: String,
}

impl<R: BufRead> ContentLines<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buffer: String::new(),
        }
    }

    fn next_line(&mut self) -> Result<Option<(usize, String)>> {
        loop {
            self.buffer.clear();
            if self.reader.read_line(&mut self.buffer)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let content = match self.buffer.find('#') {
                Some(i) => &self.buffer[..i],
                None => self.buffer.as_str(),
            }
            .trim();
            if !content.is_empty() {
                return Ok(Some((self.line_no, content.to_string())));
            }
        }
    }
}

fn parse_error(line: usize, message: &str) -> MeshError {
    MeshError::ParseError {
        line,
        message: message.to_string(),
    }
}

fn parse_value<T: std::str::FromStr>(line: usize, token: &str, what: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| parse_error(line, &format!("invalid {} '{}'", what, token)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUAD: &str = "\
OFF
# a unit square
4 2 0

0 0 0
1 0 0
1 1 0   # corner
0 1 0
3 0 1 2
3 0 2 3
";

    #[test]
    fn test_read_quad() {
        let mesh = read(Cursor::new(QUAD)).unwrap();
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.faces(), &[[0, 1, 2], [0, 2, 3]]);
        assert_eq!(mesh.position(2), &Point3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_fan_triangulation() {
        let text = "OFF 5 1 0\n0 0 0\n1 0 0\n2 1 0\n1 2 0\n0 1 0\n5 0 1 2 3 4 255 0 0\n";
        let mesh = read(Cursor::new(text)).unwrap();
        assert_eq!(mesh.faces(), &[[0, 1, 2], [0, 2, 3], [0, 3, 4]]);
    }

    #[test]
    fn test_write_then_read() {
        let mesh = read(Cursor::new(QUAD)).unwrap();
        let mut buffer = Vec::new();
        write(&mesh, &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("OFF\n4 2 0\n"));
        let again = read(Cursor::new(text)).unwrap();
        assert_eq!(again.positions(), mesh.positions());
        assert_eq!(again.faces(), mesh.faces());
    }

    #[test]
    fn test_parse_errors() {
        let missing_header = read(Cursor::new("4 2 0\n"));
        assert!(matches!(missing_header, Err(MeshError::ParseError { line: 1, .. })));

        let bad_coord = read(Cursor::new("OFF\n1 1 0\n0 x 0\n3 0 0 0\n"));
        assert!(matches!(bad_coord, Err(MeshError::ParseError { line: 3, .. })));

        let truncated = read(Cursor::new("OFF\n3 1 0\n0 0 0\n1 0 0\n"));
        assert!(matches!(truncated, Err(MeshError::ParseError { .. })));

        let short_face = read(Cursor::new("OFF\n3 1 0\n0 0 0\n1 0 0\n0 1 0\n3 0 1\n"));
        assert!(matches!(short_face, Err(MeshError::ParseError { line: 6, .. })));
    }

    #[test]
    fn test_huge_counts_fail_cleanly() {
        let text = "OFF\n18446744073709551615 1 0\n0 0 0\n";
        assert!(matches!(read(Cursor::new(text)), Err(MeshError::ParseError { .. })));

        let text = "OFF\n3 18446744073709551615 0\n0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n";
        assert!(matches!(read(Cursor::new(text)), Err(MeshError::ParseError { .. })));
    }

    #[test]
    fn test_invalid_index_rejected() {
        let text = "OFF\n3 1 0\n0 0 0\n1 0 0\n0 1 0\n3 0 1 5\n";
        let err = read(Cursor::new(text)).unwrap_err();
        assert!(err.is_invalid_mesh());
    }
}
