use std::vec;

/// Iterador sobre um snapshot do map, em ordem de inserção.
///
/// O snapshot é tirado sob o lock, então uma expiração concorrente nunca
/// aparece pela metade. Clonar o iterador recomeça do mesmo ponto.
#[derive(Debug, Clone)]
pub struct Iter<T> {
    inner: vec::IntoIter<T>,
}

impl<T> Iter<T> {
    pub(crate) fn new(items: Vec<T>) -> Self {
        Self {
            inner: items.into_iter(),
        }
    }
}

impl<T> Iterator for Iter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> DoubleEndedIterator for Iter<T> {
    fn next_back(&mut self) -> Option<T> {
        self.inner.next_back()
    }
}

impl<T> ExactSizeIterator for Iter<T> {}
