pub const PAGE_SIZE: usize = 9;

/// `ceil(len / 9)`; an empty listing has no pages.
pub fn page_count(len: usize) -> usize {
    len.div_ceil(PAGE_SIZE)
}

/// Items of the 1-based `page`, clamped to the slice. Page 0 reads as page 1.
pub fn slice<T>(items: &[T], page: usize) -> &[T] {
    let page = page.max(1);
    let start = (page - 1).saturating_mul(PAGE_SIZE).min(items.len());
    let end = page.saturating_mul(PAGE_SIZE).min(items.len());
    &items[start..end]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Arrows {
    pub left: bool,
    pub right: bool,
}

pub fn arrows(page: usize, count: usize) -> Arrows {
    Arrows {
        left: page > 1,
        right: page < count,
    }
}

/// Current page within a listing of known length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    page: usize,
    count: usize,
}

impl Pager {
    pub fn new(len: usize) -> Self {
        Self {
            page: 1,
            count: page_count(len),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn arrows(&self) -> Arrows {
        arrows(self.page, self.count)
    }

    pub fn next(&mut self) -> bool {
        if !self.arrows().right {
            return false;
        }
        self.page += 1;
        true
    }

    pub fn previous(&mut self) -> bool {
        if !self.arrows().left {
            return false;
        }
        self.page -= 1;
        true
    }
}
