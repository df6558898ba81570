use form_multipart::{FormBody, FormFile, MultipartBuilder, MultipartMessage, Part};
use log::{debug, error, info};
use std::fs::File;

fn main() {
    dotenv::dotenv().ok();
    pretty_env_logger::init();

    let path = std::env::var("FORM_FILE").expect("FORM_FILE must be set");
    let file = File::open(&path).expect("Failed to open FORM_FILE");

    let content_type = mime_guess(&path);
    let form = FormBody::new()
        .with_field("path", path.as_str())
        .with_file("file", FormFile::new(path.as_str(), content_type, file));

    let req = http::Request::post("/upload")
        .form_body(form)
        .expect("Failed to build request");

    info!(
        "Content-Type: {:?}",
        req.headers().get(http::header::CONTENT_TYPE)
    );

    match req.into_form_body() {
        Ok(parsed) => print_parts(parsed),
        Err(e) => error!("Error: {}", e),
    }
}

fn print_parts(mut form: FormBody) {
    for part in form.parts_mut() {
        match part {
            Part::Field { name, value } => debug!("Field {}: {:?}", name, value),
            Part::File { name, file } => match file.content() {
                Ok(bs) => debug!(
                    "File {}: {} ({}), {} bytes",
                    name,
                    file.filename(),
                    file.content_type(),
                    bs.len()
                ),
                Err(e) => error!("Reading {}: {}", name, e),
            },
        }
    }

    form.close();
}

fn mime_guess(path: &str) -> mime::Mime {
    match path.rsplit('.').next() {
        Some("txt") => mime::TEXT_PLAIN,
        Some("json") => mime::APPLICATION_JSON,
        Some("jpg") | Some("jpeg") => mime::IMAGE_JPEG,
        Some("png") => mime::IMAGE_PNG,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}
