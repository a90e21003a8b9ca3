//! Placement of the image and the playback controls inside the preview pane.

pub const CONTROL_HEIGHT: i32 = 25;
pub const SPACING: i32 = 10;
pub const PLAY_BUTTON_WIDTH: i32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn from_size(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

/// Child rectangles in pane-local coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewLayout {
    pub image: Rect,
    pub play_button: Option<Rect>,
    pub scrollbar: Option<Rect>,
}

/// Fits `image_size` into a `pane_width` x `pane_height` pane with a margin
/// of [`SPACING`], keeping the aspect ratio. With controls, one row of
/// [`CONTROL_HEIGHT`] goes under the image: the play button at the image's
/// left edge and the frame scrollbar across the rest of its width.
pub fn compute_layout(
    pane_width: i32,
    pane_height: i32,
    image_size: (u32, u32),
    with_controls: bool,
) -> PreviewLayout {
    let (iw, ih) = image_size;
    if pane_width <= 0 || pane_height <= 0 || iw == 0 || ih == 0 {
        return PreviewLayout::default();
    }

    let image_aspect = f64::from(iw) / f64::from(ih);
    let controls_extent = if with_controls {
        CONTROL_HEIGHT + SPACING
    } else {
        0
    };

    let max_width = (pane_width - SPACING * 2).max(0);
    let max_height = (pane_height - SPACING * 2 - controls_extent).max(0);

    let mut image_width = max_width;
    let mut image_height = (f64::from(image_width) / image_aspect) as i32;
    if image_height > max_height {
        image_height = max_height;
        image_width = (f64::from(image_height) * image_aspect) as i32;
    }

    let image_x = (pane_width - image_width) / 2;
    let image_y = (pane_height - (image_height + controls_extent)) / 2;
    let image = Rect::from_size(image_x, image_y, image_width, image_height);

    if !with_controls {
        return PreviewLayout {
            image,
            play_button: None,
            scrollbar: None,
        };
    }

    let control_y = image_y + image_height + SPACING;
    let scrollbar_width = (image_width - PLAY_BUTTON_WIDTH - SPACING).max(0);
    PreviewLayout {
        image,
        play_button: Some(Rect::from_size(
            image_x,
            control_y,
            PLAY_BUTTON_WIDTH,
            CONTROL_HEIGHT,
        )),
        scrollbar: Some(Rect::from_size(
            image_x + PLAY_BUTTON_WIDTH + SPACING,
            control_y,
            scrollbar_width,
            CONTROL_HEIGHT,
        )),
    }
}

/// Scrollbar gesture, decoded from a horizontal scroll request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollRequest {
    LineLeft,
    LineRight,
    PageLeft,
    PageRight,
    First,
    Last,
    Thumb(i32),
}

/// Frame index a scrollbar gesture lands on, clamped to `0..=last`. A zero
/// `page` pages by one frame.
pub fn scroll_target(request: ScrollRequest, current: usize, last: usize, page: usize) -> usize {
    let step = page.max(1);
    let target = match request {
        ScrollRequest::LineLeft => current.saturating_sub(1),
        ScrollRequest::LineRight => current.saturating_add(1),
        ScrollRequest::PageLeft => current.saturating_sub(step),
        ScrollRequest::PageRight => current.saturating_add(step),
        ScrollRequest::First => 0,
        ScrollRequest::Last => last,
        ScrollRequest::Thumb(pos) => usize::try_from(pos).unwrap_or(0),
    };
    target.min(last)
}
