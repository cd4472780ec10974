/// Something that contributes a segment to the archive file extension, e.g. `gz` in `.tar.gz`.
pub trait FileExtProvider {
    fn file_ext(&self) -> Option<&'static str>;
}
