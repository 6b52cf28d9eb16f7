use std::io::Cursor;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use tiny_http::{Request, Response};
use tracing::{error, info_span, warn};

use meaning_lens::{classify_image, ClassificationResult, Error, PipelineOptions, ServiceContext};

use crate::routes::{error_response, json_response};
use crate::util::multipart::MultipartForm;

// ---------------------------------------------------------------------------
// POST /predict
// ---------------------------------------------------------------------------

/// Successful prediction body.
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predicted_class: String,
    pub confidence: f64,
    pub meaning: String,
    pub preprocessed_image_base64: String,
}

impl From<ClassificationResult> for PredictResponse {
    fn from(r: ClassificationResult) -> Self {
        PredictResponse {
            predicted_class: r.predicted_label,
            confidence: f64::from(r.confidence),
            meaning: r.meaning,
            preprocessed_image_base64: r.diagnostic_image,
        }
    }
}

/// A form flag is on only when its text is `true`, ignoring case.
pub fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.to_lowercase() == "true")
}

pub fn handle(request: &mut Request, ctx: &ServiceContext) -> Response<Cursor<Vec<u8>>> {
    let content_type = request.headers().iter()
        .find(|h| h.field.equiv("Content-Type"))
        .map(|h| h.value.as_str().to_owned())
        .unwrap_or_default();

    let mut body: Vec<u8> = Vec::new();
    if let Err(e) = request.as_reader().read_to_end(&mut body) {
        error!(error = %e, "failed to read request body");
        return error_response(500, &e.to_string());
    }

    // A fresh generator per request keeps augmentation draws independent
    // across threads.
    let mut rng = StdRng::from_entropy();
    respond(&content_type, &body, ctx, &mut rng)
}

/// Request handling without the transport: parses the form, runs the
/// classifier, and maps the outcome to a JSON response.
pub fn respond<R: Rng + ?Sized>(
    content_type: &str,
    body: &[u8],
    ctx: &ServiceContext,
    rng: &mut R,
) -> Response<Cursor<Vec<u8>>> {
    let form = MultipartForm::parse(content_type, body);
    let Some(image) = form.file("image") else {
        warn!("prediction request without an image part");
        return error_response(400, &Error::InputMissing.to_string());
    };

    let options = PipelineOptions {
        augment: parse_flag(form.text("augment").as_deref()),
        to_grayscale: parse_flag(form.text("to_gray").as_deref()),
    };
    let span = info_span!("predict", bytes = image.len(), augment = options.augment, to_gray = options.to_grayscale);
    let _guard = span.enter();

    match classify_image(ctx, image, options, rng) {
        Ok(result) => json_response(200, &PredictResponse::from(result)),
        Err(e) => {
            error!(kind = ?e.kind(), error = %e, "prediction failed");
            let status = if e.is_client_error() { 400 } else { 500 };
            error_response(status, &e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use meaning_lens::{BatchTensor, ClassificationOracle, LabelTaxonomy, MeaningTable, ResultEncoder};
    use tiny_http::StatusCode;

    struct ConstantOracle;

    impl ClassificationOracle for ConstantOracle {
        fn output_len(&self) -> usize {
            2
        }
        fn predict(&self, _batch: &BatchTensor) -> meaning_lens::Result<Vec<f32>> {
            Ok(vec![0.25, 0.75])
        }
    }

    fn ctx() -> ServiceContext {
        let taxonomy = LabelTaxonomy::new(vec!["left".into(), "right".into()]).unwrap();
        let mut meanings = MeaningTable::new();
        meanings.insert("right", "Turn right.");
        ServiceContext::new(Box::new(ConstantOracle), taxonomy, meanings, ResultEncoder::default()).unwrap()
    }

    fn json_of(resp: Response<Cursor<Vec<u8>>>) -> (u16, serde_json::Value) {
        let status = resp.status_code().0;
        let mut s = String::new();
        resp.into_reader().read_to_string(&mut s).unwrap();
        (status, serde_json::from_str(&s).unwrap())
    }

    fn multipart_with(image: Option<&[u8]>, fields: &[(&str, &str)]) -> Vec<u8> {
        let mut b = Vec::new();
        for (name, value) in fields {
            b.extend_from_slice(format!("--B\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes());
        }
        if let Some(bytes) = image {
            b.extend_from_slice(b"--B\r\nContent-Disposition: form-data; name=\"image\"; filename=\"x.png\"\r\n\r\n");
            b.extend_from_slice(bytes);
            b.extend_from_slice(b"\r\n");
        }
        b.extend_from_slice(b"--B--\r\n");
        b
    }

    #[test]
    fn flags_are_case_insensitive_and_strict() {
        assert!(parse_flag(Some("true")));
        assert!(parse_flag(Some("TrUe")));
        assert!(!parse_flag(Some(" true")));
        assert!(!parse_flag(Some("1")));
        assert!(!parse_flag(None));
    }

    #[test]
    fn empty_body_is_a_client_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let (status, json) = json_of(respond("", b"", &ctx(), &mut rng));
        assert_eq!(status, 400);
        assert_eq!(json, serde_json::json!({ "error": "No image provided" }));
    }

    #[test]
    fn form_without_image_is_a_client_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let body = multipart_with(None, &[("augment", "true")]);
        let (status, _) = json_of(respond("multipart/form-data; boundary=B", &body, &ctx(), &mut rng));
        assert_eq!(status, 400);
    }

    #[test]
    fn undecodable_image_is_a_server_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let body = multipart_with(Some(b"not an image"), &[]);
        let (status, json) = json_of(respond("multipart/form-data; boundary=B", &body, &ctx(), &mut rng));
        assert_eq!(status, 500);
        assert!(json["error"].as_str().unwrap().contains("cannot identify image file"));
    }

    #[test]
    fn valid_upload_returns_prediction_record() {
        let img = RgbImage::from_pixel(100, 100, Rgb([30, 90, 160]));
        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut png, ImageOutputFormat::Png).unwrap();
        let body = multipart_with(Some(png.get_ref()), &[("to_gray", "false")]);

        let mut rng = StdRng::seed_from_u64(1);
        let resp = respond("multipart/form-data; boundary=B", &body, &ctx(), &mut rng);
        assert_eq!(resp.status_code(), StatusCode(200));
        let (_, json) = json_of(resp);
        assert_eq!(json["predicted_class"], "right");
        assert_eq!(json["confidence"], 0.75);
        assert_eq!(json["meaning"], "Turn right.");
        assert!(!json["preprocessed_image_base64"].as_str().unwrap().is_empty());
    }
}
