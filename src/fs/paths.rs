use std::path::{Path, PathBuf};

use super::Fs;

/// Utility fns for making common types of paths.
impl Fs {
    /// $OUTPUT/subject
    pub fn subject_dir<'a>(&self, subject: &str, buf: &'a mut PathBuf) -> &'a Path {
        self.parts2(&self.output_prefix, subject, buf)
    }

    /// $OUTPUT/subject/graph.json
    pub fn manifest<'a>(&self, subject: &str, buf: &'a mut PathBuf) -> &'a Path {
        self.parts3(&self.output_prefix, subject, "graph.json", buf)
    }

    fn parts2<'a, T, U>(&self, p1: T, p2: U, buf: &'a mut PathBuf) -> &'a Path
    where
        T: AsRef<Path>,
        U: AsRef<Path>,
    {
        buf.clear();
        buf.push(p1);
        buf.push(p2);
        &*buf
    }

    fn parts3<'a, T, U, V>(&self, p1: T, p2: U, p3: V, buf: &'a mut PathBuf) -> &'a Path
    where
        T: AsRef<Path>,
        U: AsRef<Path>,
        V: AsRef<Path>,
    {
        buf.clear();
        buf.push(p1);
        buf.push(p2);
        buf.push(p3);
        &*buf
    }
}
