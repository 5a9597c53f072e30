//! Parser for Wavefront `.obj` mesh files.
//!
//! Only vertex (`v`) and face (`f`) records are read; faces are
//! fan-triangulated. The resulting [`ObjMesh`] is turned into a queryable
//! solid by [`MeshShape`](crate::mesh::MeshShape).

use nalgebra::Vector3;

use super::ParseError;

/// A parsed triangle mesh.
#[derive(Debug, Clone)]
pub struct ObjMesh {
    /// Vertex positions in metres (after scaling).
    pub vertices: Vec<Vector3<f64>>,
    /// Triangles as 0-based indices into `vertices`.
    pub faces: Vec<[usize; 3]>,
}

fn format_error(line: usize, message: impl Into<String>) -> ParseError {
    ParseError::FormatError {
        line,
        message: message.into(),
    }
}

/// Parse OBJ text. Every coordinate is multiplied by `scale`, so a file
/// authored in millimetres is loaded with `scale = 1e-3`.
pub fn parse_obj(content: &str, scale: f64) -> Result<ObjMesh, ParseError> {
    let mut vertices = Vec::new();
    let mut polygons: Vec<(usize, Vec<usize>)> = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let mut tokens = raw.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let coords = tokens
                    .take(3)
                    .map(|tok| {
                        tok.parse::<f64>()
                            .map_err(|_| format_error(line_no, format!("Invalid coordinate '{tok}'")))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if coords.len() < 3 {
                    return Err(format_error(
                        line_no,
                        format!("Vertex needs 3 coordinates, got {}", coords.len()),
                    ));
                }
                vertices.push(Vector3::new(coords[0], coords[1], coords[2]) * scale);
            }
            Some("f") => {
                // `v`, `v/vt`, `v/vt/vn` and `v//vn` all start with the vertex index.
                let indices = tokens
                    .map(|tok| {
                        let head = tok.split('/').next().unwrap_or(tok);
                        match head.parse::<usize>() {
                            Ok(0) | Err(_) => Err(format_error(
                                line_no,
                                format!("Invalid face index '{tok}' (indices are 1-based)"),
                            )),
                            Ok(i) => Ok(i - 1),
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if indices.len() < 3 {
                    return Err(format_error(
                        line_no,
                        format!("Face needs at least 3 vertices, got {}", indices.len()),
                    ));
                }
                polygons.push((line_no, indices));
            }
            _ => {}
        }
    }

    if vertices.len() < 4 {
        return Err(format_error(
            0,
            format!("A closed mesh needs at least 4 vertices, got {}", vertices.len()),
        ));
    }
    if polygons.is_empty() {
        return Err(format_error(0, "No faces found"));
    }

    let mut faces = Vec::new();
    for (line_no, poly) in polygons {
        if let Some(&bad) = poly.iter().find(|&&i| i >= vertices.len()) {
            return Err(format_error(
                line_no,
                format!("Vertex {} referenced but only {} exist", bad + 1, vertices.len()),
            ));
        }
        faces.extend((1..poly.len() - 1).map(|i| [poly[0], poly[i], poly[i + 1]]));
    }

    Ok(ObjMesh { vertices, faces })
}

/// Build a cube OBJ string for testing. Cube spans ±half_size on each axis.
#[cfg(test)]
pub(crate) fn cube_obj(half_size: f64) -> String {
    let h = half_size;
    format!(
        "# cube\n\
         v {h} {h} -{h}\nv {h} -{h} -{h}\nv -{h} -{h} -{h}\nv -{h} {h} -{h}\n\
         v {h} {h} {h}\nv {h} -{h} {h}\nv -{h} -{h} {h}\nv -{h} {h} {h}\n\
         f 1 2 3 4\nf 5 8 7 6\nf 1 5 6 2\nf 3 7 8 4\nf 1 4 8 5\nf 2 6 7 3\n"
    )
}
