//! Union-Find data structure for clustering duplicate records.
//!
//! A disjoint-set forest with path compression and union-by-size, used to
//! turn pairwise "is duplicate of" edges into connected components.

/// Union-Find (Disjoint Set Union) over the ids `[0, n)`.
pub struct UnionFind {
    /// Parent pointers. parent[i] = j means i's parent is j.
    parent: Vec<usize>,
    /// Set size, valid only at roots.
    size: Vec<usize>,
}

impl UnionFind {
    /// Create a new Union-Find structure with n singleton sets.
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    /// Find the root of the set containing x, compressing the path behind it.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Union the sets containing x and y, attaching the smaller under the larger.
    ///
    /// Returns true if x and y were in different sets (and are now merged).
    pub fn union(&mut self, x: usize, y: usize) -> bool {
        let mut rx = self.find(x);
        let mut ry = self.find(y);
        if rx == ry {
            return false;
        }
        if self.size[rx] < self.size[ry] {
            std::mem::swap(&mut rx, &mut ry);
        }
        self.parent[ry] = rx;
        self.size[rx] += self.size[ry];
        true
    }

    /// The partition as groups of ascending ids, ordered by smallest member.
    #[must_use]
    pub fn groups(&mut self) -> Vec<Vec<usize>> {
        let n = self.parent.len();
        let mut slot_of_root = vec![usize::MAX; n];
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for i in 0..n {
            let root = self.find(i);
            if slot_of_root[root] == usize::MAX {
                slot_of_root[root] = groups.len();
                groups.push(Vec::with_capacity(self.size[root]));
            }
            groups[slot_of_root[root]].push(i);
        }
        groups
    }

    /// Get the total number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Check if the structure is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }
}
