//! Page-number control: which page labels to show for a given position.

use ratatui::layout::Rect;

/// At or below this many pages every page number is shown.
pub const COMPACT_THRESHOLD: u32 = 7;
/// Number of pages shown around the current one in the collapsed form.
const WINDOW: u32 = 3;

const PREVIOUS_LABEL: &str = "‹ Prev";
const NEXT_LABEL: &str = "Next ›";
const ELLIPSIS_LABEL: &str = "…";
const SEGMENT_GAP: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(u32),
    Ellipsis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageControl {
    pub current: u32,
    pub total: u32,
    pub items: Vec<PageItem>,
    pub previous_enabled: bool,
    pub next_enabled: bool,
}

/// Returns `None` when there is nothing to paginate.
pub fn page_control(current: u32, total: u32) -> Option<PageControl> {
    if total <= 1 {
        return None;
    }

    let items = if total <= COMPACT_THRESHOLD {
        (1..=total).map(PageItem::Page).collect()
    } else {
        collapsed_items(current, total)
    };

    Some(PageControl {
        current,
        total,
        items,
        previous_enabled: current > 1,
        next_enabled: current < total,
    })
}

fn collapsed_items(current: u32, total: u32) -> Vec<PageItem> {
    // Window lives in [2, total - 1] and keeps WINDOW pages even at the edges.
    let last_inner = total - 1;
    let mut start = current.saturating_sub(WINDOW / 2).max(2);
    let mut end = start + WINDOW - 1;
    if end > last_inner {
        end = last_inner;
        start = end + 1 - WINDOW;
    }

    let mut items = Vec::with_capacity(WINDOW as usize + 4);
    items.push(PageItem::Page(1));
    if start > 2 {
        items.push(PageItem::Ellipsis);
    }
    items.extend((start..=end).map(PageItem::Page));
    if end < last_inner {
        items.push(PageItem::Ellipsis);
    }
    items.push(PageItem::Page(total));
    items
}

/// What a click on part of the control refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTarget {
    Previous,
    Page(u32),
    Gap,
    Next,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub target: PageTarget,
    pub label: String,
    pub enabled: bool,
}

impl Segment {
    pub fn width(&self) -> u16 {
        unicode_width::UnicodeWidthStr::width(self.label.as_str()) as u16
    }
}

/// Flatten the control into the labelled pieces drawn on screen, left to right.
pub fn segments(control: &PageControl) -> Vec<Segment> {
    let mut out = Vec::with_capacity(control.items.len() + 2);
    out.push(Segment {
        target: PageTarget::Previous,
        label: PREVIOUS_LABEL.to_string(),
        enabled: control.previous_enabled,
    });
    for item in &control.items {
        out.push(match *item {
            PageItem::Page(n) => Segment {
                target: PageTarget::Page(n),
                label: format!(" {} ", n),
                enabled: n != control.current,
            },
            PageItem::Ellipsis => Segment {
                target: PageTarget::Gap,
                label: ELLIPSIS_LABEL.to_string(),
                enabled: false,
            },
        });
    }
    out.push(Segment {
        target: PageTarget::Next,
        label: NEXT_LABEL.to_string(),
        enabled: control.next_enabled,
    });
    out
}

pub fn segments_width(segments: &[Segment]) -> u16 {
    let labels: u16 = segments.iter().map(Segment::width).sum();
    labels + SEGMENT_GAP * segments.len().saturating_sub(1) as u16
}

/// Column where the centered control starts inside `area`.
pub fn control_origin(area: Rect, segments: &[Segment]) -> u16 {
    area.x + area.width.saturating_sub(segments_width(segments)) / 2
}

/// Map a clicked column back to the segment drawn there.
pub fn hit_test(area: Rect, control: &PageControl, column: u16) -> Option<PageTarget> {
    let segs = segments(control);
    let mut x = control_origin(area, &segs);
    for seg in &segs {
        let w = seg.width();
        if column >= x && column < x + w {
            return Some(seg.target);
        }
        x += w + SEGMENT_GAP;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(control: &PageControl) -> Vec<u32> {
        control
            .items
            .iter()
            .filter_map(|i| match i {
                PageItem::Page(n) => Some(*n),
                PageItem::Ellipsis => None,
            })
            .collect()
    }

    #[test]
    fn test_no_control_for_single_page() {
        assert!(page_control(1, 0).is_none());
        assert!(page_control(1, 1).is_none());
    }

    #[test]
    fn test_five_pages_all_shown() {
        let control = page_control(1, 5).unwrap();
        assert_eq!(control.items, (1..=5).map(PageItem::Page).collect::<Vec<_>>());
        assert!(!control.previous_enabled);
        assert!(control.next_enabled);
    }

    #[test]
    fn test_threshold_pages_have_no_ellipsis() {
        let control = page_control(4, COMPACT_THRESHOLD).unwrap();
        assert!(!control.items.contains(&PageItem::Ellipsis));
        assert_eq!(control.items.len(), COMPACT_THRESHOLD as usize);
    }

    #[test]
    fn test_middle_of_fifteen() {
        let control = page_control(8, 15).unwrap();
        assert_eq!(
            control.items,
            vec![
                PageItem::Page(1),
                PageItem::Ellipsis,
                PageItem::Page(7),
                PageItem::Page(8),
                PageItem::Page(9),
                PageItem::Ellipsis,
                PageItem::Page(15),
            ]
        );
        assert!(control.previous_enabled);
        assert!(control.next_enabled);
    }

    #[test]
    fn test_first_page_widens_window_right() {
        let control = page_control(1, 15).unwrap();
        assert_eq!(
            control.items,
            vec![
                PageItem::Page(1),
                PageItem::Page(2),
                PageItem::Page(3),
                PageItem::Page(4),
                PageItem::Ellipsis,
                PageItem::Page(15),
            ]
        );
    }

    #[test]
    fn test_last_page_widens_window_left() {
        let control = page_control(15, 15).unwrap();
        assert_eq!(
            control.items,
            vec![
                PageItem::Page(1),
                PageItem::Ellipsis,
                PageItem::Page(12),
                PageItem::Page(13),
                PageItem::Page(14),
                PageItem::Page(15),
            ]
        );
        assert!(!control.next_enabled);
    }

    #[test]
    fn test_invariants_hold_for_every_position() {
        for total in (COMPACT_THRESHOLD + 1)..=40 {
            let mut widths = Vec::new();
            for current in 1..=total {
                let control = page_control(current, total).unwrap();
                let nums = numbers(&control);
                assert_eq!(nums.first(), Some(&1));
                assert_eq!(nums.last(), Some(&total));
                assert!(nums.contains(&current), "page {current} of {total} hidden");
                assert!(nums.windows(2).all(|w| w[0] < w[1]));
                widths.push(nums.len());

                for (idx, item) in control.items.iter().enumerate() {
                    if *item == PageItem::Ellipsis {
                        let (PageItem::Page(before), PageItem::Page(after)) =
                            (control.items[idx - 1], control.items[idx + 1])
                        else {
                            panic!("ellipsis not between numbers");
                        };
                        assert!(after - before >= 2);
                    }
                }
                for pair in nums.windows(2) {
                    if pair[1] - pair[0] >= 2 {
                        assert!(control.items.contains(&PageItem::Ellipsis));
                    }
                }
            }
            assert!(widths.iter().all(|w| *w == widths[0]), "width varies for {total}");
        }
    }

    #[test]
    fn test_segments_mark_current_and_boundaries() {
        let control = page_control(1, 3).unwrap();
        let segs = segments(&control);
        assert_eq!(segs.len(), 5);
        assert_eq!(segs[0].target, PageTarget::Previous);
        assert!(!segs[0].enabled);
        assert_eq!(segs[1].target, PageTarget::Page(1));
        assert!(!segs[1].enabled);
        assert!(segs[2].enabled);
        assert_eq!(segs[4].target, PageTarget::Next);
        assert!(segs[4].enabled);
    }

    #[test]
    fn test_hit_test_finds_each_segment() {
        let control = page_control(8, 15).unwrap();
        let area = Rect::new(0, 10, 80, 1);
        let segs = segments(&control);
        let mut x = control_origin(area, &segs);
        for seg in &segs {
            assert_eq!(hit_test(area, &control, x), Some(seg.target));
            x += seg.width() + 1;
        }
    }

    #[test]
    fn test_hit_test_outside_control() {
        let control = page_control(2, 3).unwrap();
        let area = Rect::new(0, 0, 80, 1);
        assert_eq!(hit_test(area, &control, 0), None);
        assert_eq!(hit_test(area, &control, 79), None);
    }
}
