/// 이미지가 속한 엔티티 종류
///
/// 파일 이름만 내려온 이미지는 종류별 정적 경로 아래에 있다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Book,
    Genre,
    Author,
}

impl ImageKind {
    pub fn static_prefix(&self) -> &'static str {
        match self {
            ImageKind::Book => "/static/images/books/",
            ImageKind::Genre => "/static/images/genres/",
            ImageKind::Author => "/static/images/authors/",
        }
    }

    pub fn placeholder(&self) -> &'static str {
        match self {
            ImageKind::Book => "https://via.placeholder.com/144x192?text=No+Cover",
            ImageKind::Genre => "https://placehold.co/300x200/EFEFEF/AAAAAA?text=No+Image",
            ImageKind::Author => "https://placehold.co/200x200/EFEFEF/AAAAAA?text=No+Photo",
        }
    }
}

/// API 응답의 이미지 참조를 요청 가능한 URL로 변환한다.
///
/// - `http://`, `https://`로 시작하면 그대로 사용한다.
/// - `/`로 시작하면 API 주소를 앞에 붙인다.
/// - 파일 이름만 있으면 API 주소와 종류별 정적 경로를 붙인다.
/// - 비어있으면 대체 이미지를 사용한다.
///
/// # Example
/// ```
/// use book_shop_client::provider::image::{resolve_image, ImageKind};
///
/// let base = "http://localhost:8000/";
/// assert_eq!(resolve_image(base, Some("/static/a.png"), ImageKind::Book), "http://localhost:8000/static/a.png");
/// assert_eq!(resolve_image(base, Some("fantasy.jpg"), ImageKind::Genre), "http://localhost:8000/static/images/genres/fantasy.jpg");
/// assert_eq!(resolve_image(base, Some("https://cdn.kz/x.png"), ImageKind::Book), "https://cdn.kz/x.png");
/// assert_eq!(resolve_image(base, None, ImageKind::Book), ImageKind::Book.placeholder());
/// ```
pub fn resolve_image(base_url: &str, img: Option<&str>, kind: ImageKind) -> String {
    let img = match img.map(str::trim) {
        Some(img) if !img.is_empty() => img,
        _ => return kind.placeholder().to_owned(),
    };

    let lower = img.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return img.to_owned();
    }

    let base = base_url.trim_end_matches('/');
    if img.starts_with('/') {
        format!("{}{}", base, img)
    } else {
        format!("{}{}{}", base, kind.static_prefix(), img)
    }
}

/// 화면에 표시할 이미지 소스
///
/// 로드에 실패하면 대체 이미지로 전환되며, 대체 이미지에서 다시 실패하더라도 반복하지 않는다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    url: String,
    kind: ImageKind,
    failed: bool,
}

impl ImageSource {
    pub fn new(base_url: &str, img: Option<&str>, kind: ImageKind) -> Self {
        ImageSource { url: resolve_image(base_url, img, kind), kind, failed: false }
    }

    pub fn url(&self) -> &str {
        if self.failed {
            self.kind.placeholder()
        } else {
            &self.url
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.url() == self.kind.placeholder()
    }

    pub fn on_load_failed(&mut self) -> &str {
        if !self.failed {
            tracing::warn!(url = %self.url, "Image failed to load, using placeholder");
            self.failed = true;
        }
        self.url()
    }
}
